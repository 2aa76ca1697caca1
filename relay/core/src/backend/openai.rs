//! OpenAI-compatible chat completions
//!
//! Upstream sends `data: {json}` lines and finishes with `data: [DONE]`. Each
//! object carries `choices[0].delta.content`; gateways that proxy reasoning
//! models may add `choices[0].delta.reasoning_content`, which is decoded as
//! thinking.
//!
//! The same object shape is used by DeepSeek, so the choice-level decoding
//! lives here and [`super::deepseek`] reuses it with a stricter line filter.

use serde_json::Value;

use super::decoder::{
    first_choice, is_done_marker, is_json_object, non_empty_str, parse_payload,
    strip_data_prefix, DecodeError, LineDecoder, LineOutcome,
};
use super::traits::{Delta, LlmRequest, WireFormat};

/// Default endpoint path appended to the provider base URL
pub const DEFAULT_ENDPOINT_PATH: &str = "/chat/completions";

/// Which upstream lines a chat-completion decoder accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LineFilter {
    /// `data:` lines, plus bare JSON objects from lenient gateways
    SsePrefixed,
    /// Only bare `{...}` objects and `[DONE]`
    BareJson,
}

/// Decoder for chat-completion chunk objects
#[derive(Debug)]
pub(crate) struct ChatCompletionDecoder {
    format: WireFormat,
    filter: LineFilter,
    finish_reason: Option<String>,
}

impl ChatCompletionDecoder {
    pub(crate) fn new(format: WireFormat, filter: LineFilter) -> Self {
        Self {
            format,
            filter,
            finish_reason: None,
        }
    }

    fn payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let payload = match self.filter {
            LineFilter::SsePrefixed => strip_data_prefix(trimmed).unwrap_or(trimmed),
            LineFilter::BareJson => trimmed,
        };
        (is_done_marker(payload) || is_json_object(payload)).then_some(payload)
    }

    fn decode_choice(&mut self, value: &Value) -> Result<Vec<Delta>, DecodeError> {
        let choice = first_choice(value)?;
        if let Some(reason) = non_empty_str(choice, "finish_reason") {
            self.finish_reason = Some(reason.to_string());
        }

        let mut deltas = Vec::with_capacity(2);
        if let Some(delta) = choice.get("delta") {
            // Reasoning always precedes answer text from the same object
            if let Some(thinking) = non_empty_str(delta, "reasoning_content") {
                deltas.push(Delta::Thinking(thinking.to_string()));
            }
            if let Some(content) = non_empty_str(delta, "content") {
                deltas.push(Delta::Chunk(content.to_string()));
            }
        }
        Ok(deltas)
    }
}

impl LineDecoder for ChatCompletionDecoder {
    fn decode_line(&mut self, line: &str) -> LineOutcome {
        let Some(payload) = self.payload(line) else {
            return LineOutcome::skip();
        };

        if is_done_marker(payload) {
            let finish_reason = self
                .finish_reason
                .take()
                .unwrap_or_else(|| "stop".to_string());
            return LineOutcome::finish(vec![Delta::End { finish_reason }]);
        }

        let Some(value) = parse_payload(self.format, payload) else {
            return LineOutcome::skip();
        };

        match self.decode_choice(&value) {
            Ok(deltas) => LineOutcome::emit(deltas),
            Err(e) => {
                tracing::debug!(wire_format = %self.format, error = %e, "Ignoring line without choices");
                LineOutcome::skip()
            }
        }
    }
}

/// Decoder for OpenAI-compatible streams
#[derive(Debug)]
pub struct OpenAiDecoder(ChatCompletionDecoder);

impl OpenAiDecoder {
    /// Create a decoder for one response
    #[must_use]
    pub fn new() -> Self {
        Self(ChatCompletionDecoder::new(
            WireFormat::OpenAi,
            LineFilter::SsePrefixed,
        ))
    }
}

impl Default for OpenAiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder for OpenAiDecoder {
    fn decode_line(&mut self, line: &str) -> LineOutcome {
        self.0.decode_line(line)
    }
}

/// Request body for an OpenAI-compatible streaming call
#[must_use]
pub fn request_body(request: &LlmRequest) -> Value {
    serde_json::json!({
        "model": request.model,
        "messages": request.messages(),
        "stream": true,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}
