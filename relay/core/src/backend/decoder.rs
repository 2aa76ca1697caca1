//! Line decoders
//!
//! A [`LineDecoder`] consumes one upstream line at a time and reports the
//! deltas it produced plus whether the upstream signalled the end. Decoders
//! own their accumulation state; a fresh one is created per adapter call.

use futures::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;

use super::deepseek::DeepSeekDecoder;
use super::greatwall::GreatWallDecoder;
use super::openai::OpenAiDecoder;
use super::traits::{Delta, WireFormat};

/// A malformed upstream line
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line was not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON did not have the expected structure
    #[error("unexpected payload shape: {0}")]
    Shape(&'static str),
}

/// Result of decoding one line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineOutcome {
    /// Deltas produced by the line, in order
    pub deltas: Vec<Delta>,
    /// The upstream signalled completion; no further lines should be read
    pub finished: bool,
}

impl LineOutcome {
    /// Nothing to emit
    #[must_use]
    pub fn skip() -> Self {
        Self::default()
    }

    /// Deltas without finishing
    #[must_use]
    pub fn emit(deltas: Vec<Delta>) -> Self {
        Self {
            deltas,
            finished: false,
        }
    }

    /// Deltas followed by completion
    #[must_use]
    pub fn finish(deltas: Vec<Delta>) -> Self {
        Self {
            deltas,
            finished: true,
        }
    }
}

/// Decodes one upstream wire format line by line
pub trait LineDecoder: Send {
    /// Decode one raw line (without its newline)
    ///
    /// Malformed lines are logged and skipped; they never fail the stream.
    fn decode_line(&mut self, line: &str) -> LineOutcome;
}

/// Create a fresh decoder for a wire format
#[must_use]
pub fn decoder_for(format: WireFormat) -> Box<dyn LineDecoder> {
    match format {
        WireFormat::OpenAi => Box::new(OpenAiDecoder::new()),
        WireFormat::DeepSeek => Box::new(DeepSeekDecoder::new()),
        WireFormat::GreatWall => Box::new(GreatWallDecoder::new()),
    }
}

/// Decode a finite sequence of lines, stopping at the completion signal
pub fn decode_lines<'a, I>(format: WireFormat, lines: I) -> Vec<Delta>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut decoder = decoder_for(format);
    let mut deltas = Vec::new();
    for line in lines {
        let outcome = decoder.decode_line(line);
        deltas.extend(outcome.deltas);
        if outcome.finished {
            break;
        }
    }
    deltas
}

/// Decode a stream of lines lazily
pub fn decode_stream<S>(format: WireFormat, lines: S) -> impl Stream<Item = Delta> + Send
where
    S: Stream<Item = String> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let mut decoder = decoder_for(format);
        let mut lines = lines;
        while let Some(line) = lines.next().await {
            let outcome = decoder.decode_line(&line);
            for delta in outcome.deltas {
                yield delta;
            }
            if outcome.finished {
                break;
            }
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Payload of an SSE `data:` line, trimmed
pub(crate) fn strip_data_prefix(line: &str) -> Option<&str> {
    line.trim().strip_prefix("data:").map(str::trim)
}

/// Whether a trimmed line looks like a single JSON object
pub(crate) fn is_json_object(line: &str) -> bool {
    line.starts_with('{') && line.ends_with('}')
}

/// Whether a payload is the `[DONE]` termination marker
pub(crate) fn is_done_marker(payload: &str) -> bool {
    payload == "[DONE]"
}

/// Parse a JSON payload, logging and discarding it when malformed
pub(crate) fn parse_payload(format: WireFormat, payload: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(payload).map_err(DecodeError::from) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                wire_format = %format,
                error = %e,
                line = %truncate(payload, 200),
                "Skipping malformed upstream line"
            );
            None
        }
    }
}

/// Non-empty string field of a JSON object
pub(crate) fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// `choices[0]` of a chat-completion style object
pub(crate) fn first_choice(value: &Value) -> Result<&Value, DecodeError> {
    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(DecodeError::Shape("missing choices[0]"))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
