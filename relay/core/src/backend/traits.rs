//! Provider Adapter Trait
//!
//! Defines the interface every upstream provider implements. An adapter turns
//! one [`LlmRequest`] into a lazy stream of canonical [`Delta`]s; wire-format
//! differences, retries and timeouts stay behind this boundary.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lazy stream of deltas produced by one adapter call
pub type DeltaStream = BoxStream<'static, Delta>;

/// Upstream streaming wire format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireFormat {
    /// `data: {json}` lines terminated by `data: [DONE]`
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Bare `{json}` lines with optional `reasoning_content`
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Event-tagged JSON (`message_start`, `llm_chunk`, ...)
    #[serde(rename = "greatwall")]
    GreatWall,
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::DeepSeek => write!(f, "deepseek"),
            Self::GreatWall => write!(f, "greatwall"),
        }
    }
}

/// Canonical decoded unit of an upstream stream
#[derive(Clone, Debug, PartialEq)]
pub enum Delta {
    /// Reasoning text
    Thinking(String),
    /// Answer text
    Chunk(String),
    /// Upstream signalled completion
    End {
        /// Reason reported by the upstream, `stop` when none was given
        finish_reason: String,
    },
    /// The call failed after retries were exhausted
    Error(BackendError),
}

impl Delta {
    /// Completion with the default `stop` reason
    #[must_use]
    pub fn end() -> Self {
        Self::End {
            finish_reason: "stop".to_string(),
        }
    }
}

/// Transport-level failure talking to an upstream provider
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Could not establish a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response or frame within the read timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-success status
    #[error("upstream returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The connection broke while sending or while reading the response
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The request could not be built (bad URL, builder or redirect error)
    #[error("request failed: {0}")]
    Request(String),
}

impl BackendError {
    /// Map a reqwest error onto the transport taxonomy
    ///
    /// Only failures to build the request are [`BackendError::Request`];
    /// anything that happened on the wire is a retryable transport error.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, read_timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(read_timeout)
        } else if err.is_builder() || err.is_redirect() {
            Self::Request(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            // reset before the response arrived, broken body, undecodable frame
            Self::Stream(err.to_string())
        }
    }
}

/// Request sent to a provider adapter
#[derive(Clone, Debug, PartialEq)]
pub struct LlmRequest {
    /// Model to use
    pub model: String,
    /// Fully assembled prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Ask the model to emit reasoning
    pub enable_thinking: bool,
    /// Reasoning token budget when thinking is enabled
    pub thinking_budget: Option<u32>,
}

impl LlmRequest {
    /// Create a new request
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 2000,
            enable_thinking: false,
            thinking_budget: None,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Enable reasoning output with an optional budget
    #[must_use]
    pub fn with_thinking(mut self, budget: Option<u32>) -> Self {
        self.enable_thinking = true;
        self.thinking_budget = budget;
        self
    }

    /// Chat messages sent upstream: the assembled prompt as one user turn
    #[must_use]
    pub fn messages(&self) -> serde_json::Value {
        serde_json::json!([{ "role": "user", "content": self.prompt }])
    }
}

/// An upstream LLM provider
///
/// Implementations must not let raw transport errors escape: failures are
/// reported as a single trailing [`Delta::Error`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name as registered in configuration
    fn name(&self) -> &str;

    /// Wire format this adapter decodes
    fn wire_format(&self) -> WireFormat;

    /// Start a streaming generation
    ///
    /// Nothing is sent upstream until the returned stream is polled.
    fn stream(&self, request: &LlmRequest) -> DeltaStream;

    /// Check whether the upstream is reachable
    async fn health_check(&self) -> bool;
}
