//! DeepSeek reasoning streams
//!
//! DeepSeek sends one bare JSON object per line and ends with `[DONE]`. A
//! single object may carry both `reasoning_content` and `content`; the
//! reasoning is emitted first.

use serde_json::Value;

use super::decoder::{LineDecoder, LineOutcome};
use super::openai::{ChatCompletionDecoder, LineFilter};
use super::traits::{LlmRequest, WireFormat};

/// Default endpoint path appended to the provider base URL
pub const DEFAULT_ENDPOINT_PATH: &str = "/v1/chat/completions";

/// Decoder for DeepSeek streams
#[derive(Debug)]
pub struct DeepSeekDecoder(ChatCompletionDecoder);

impl DeepSeekDecoder {
    /// Create a decoder for one response
    #[must_use]
    pub fn new() -> Self {
        Self(ChatCompletionDecoder::new(
            WireFormat::DeepSeek,
            LineFilter::BareJson,
        ))
    }
}

impl Default for DeepSeekDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder for DeepSeekDecoder {
    fn decode_line(&mut self, line: &str) -> LineOutcome {
        self.0.decode_line(line)
    }
}

/// Request body for a DeepSeek streaming call
#[must_use]
pub fn request_body(request: &LlmRequest) -> Value {
    let mut body = super::openai::request_body(request);
    if request.enable_thinking {
        body["enable_thinking"] = Value::Bool(true);
        if let Some(budget) = request.thinking_budget {
            body["thinking_budget"] = Value::from(budget);
        }
    }
    body
}
