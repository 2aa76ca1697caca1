//! GreatWall event-tagged streams
//!
//! The GreatWall serving platform runs a workflow and reports progress as JSON
//! objects tagged with an `event` field, either bare or behind `data:`:
//!
//! | event              | meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | `message_start`    | workflow accepted, no content                    |
//! | `llm_chunk`        | partial text in `data.choices[0].delta.content`  |
//! | `llm_finished`     | one model node finished, more may follow         |
//! | `message_finished` | workflow done, final text in `data.output`       |

use serde_json::Value;

use super::decoder::{
    first_choice, is_done_marker, is_json_object, non_empty_str, parse_payload,
    strip_data_prefix, LineDecoder, LineOutcome,
};
use super::traits::{Delta, LlmRequest, WireFormat};

/// Endpoint path template; `{api_run_id}` is substituted per model
pub const DEFAULT_ENDPOINT_PATH: &str = "/v1/ai_serve/run/{api_run_id}/stream_call";

/// Run id used when a model does not configure one
pub const DEFAULT_API_RUN_ID: &str = "default";

/// Decoder for GreatWall streams
#[derive(Debug, Default)]
pub struct GreatWallDecoder;

impl GreatWallDecoder {
    /// Create a decoder for one response
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn payload(line: &str) -> Option<&str> {
        let trimmed = line.trim();
        let payload = strip_data_prefix(trimmed).unwrap_or(trimmed);
        (is_json_object(payload) || is_done_marker(payload)).then_some(payload)
    }

    fn chunk_content(value: &Value) -> Option<String> {
        let data = value.get("data")?;
        let choice = first_choice(data).ok()?;
        let delta = choice.get("delta")?;
        non_empty_str(delta, "content").map(str::to_string)
    }
}

impl LineDecoder for GreatWallDecoder {
    fn decode_line(&mut self, line: &str) -> LineOutcome {
        let Some(payload) = Self::payload(line) else {
            return LineOutcome::skip();
        };
        if is_done_marker(payload) {
            return LineOutcome::finish(vec![Delta::end()]);
        }
        let Some(value) = parse_payload(WireFormat::GreatWall, payload) else {
            return LineOutcome::skip();
        };

        match value.get("event").and_then(Value::as_str) {
            Some("message_start" | "llm_finished") => LineOutcome::skip(),
            Some("llm_chunk") => match Self::chunk_content(&value) {
                Some(content) => LineOutcome::emit(vec![Delta::Chunk(content)]),
                None => LineOutcome::skip(),
            },
            Some("message_finished") => {
                let output = value
                    .get("data")
                    .and_then(|data| non_empty_str(data, "output"));
                let mut deltas = Vec::with_capacity(2);
                if let Some(output) = output {
                    deltas.push(Delta::Chunk(output.to_string()));
                }
                deltas.push(Delta::end());
                LineOutcome::finish(deltas)
            }
            Some(other) => {
                tracing::debug!(event = %other, "Ignoring unknown GreatWall event");
                LineOutcome::skip()
            }
            None => {
                tracing::debug!("Ignoring GreatWall line without event tag");
                LineOutcome::skip()
            }
        }
    }
}

/// Endpoint path for a model's run id
#[must_use]
pub fn endpoint_path(template: &str, api_run_id: Option<&str>) -> String {
    template.replace("{api_run_id}", api_run_id.unwrap_or(DEFAULT_API_RUN_ID))
}

/// Per-request trace id: `<prefix>_<16 hex chars>`
#[must_use]
pub fn generate_tpuid(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..16])
}

/// Request body for a GreatWall streaming call
#[must_use]
pub fn request_body(request: &LlmRequest, tpuid: &str) -> Value {
    serde_json::json!({
        "model": request.model,
        "messages": request.messages(),
        "stream": true,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "enable_thinking": request.enable_thinking,
        "tpuid": tpuid,
    })
}
