//! Relay Messages
//!
//! Events sent from the relay to connected clients. Every upstream provider,
//! whatever its wire format, is normalized into this one vocabulary before a
//! client sees it.
//!
//! # Wire Encoding
//!
//! Clients consume a server-sent-events stream. Each [`ChatEvent`] becomes one
//! named SSE frame whose `data` line carries the variant's payload as JSON with
//! camelCase field names:
//!
//! ```text
//! event: chunk
//! data: {"content":"Hello"}
//!
//! event: end
//! data: {"messageId":42,"finishReason":"stop"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Conversation identifier, owned by the external conversation store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted message identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Search Results
// ============================================================================

/// One result returned by a search backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Result title
    pub title: String,
    /// Source URL, absent for synthesized entries such as an AI summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Short excerpt
    #[serde(default)]
    pub snippet: String,
    /// Longer body text when the backend provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Relevance score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchResult {
    /// Create a result with a title, URL and snippet
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: Some(url.into()),
            snippet: snippet.into(),
            content: None,
            score: None,
        }
    }

    /// Set the body text
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the relevance score
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Whether this result can be shown to a client as a citation
    ///
    /// Only absolute `http`/`https` URLs with a host qualify.
    #[must_use]
    pub fn is_citable(&self) -> bool {
        self.url
            .as_deref()
            .and_then(|raw| url::Url::parse(raw.trim()).ok())
            .is_some_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
    }

    /// Best available body text: content when present, otherwise the snippet
    #[must_use]
    pub fn body(&self) -> &str {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => content,
            _ => &self.snippet,
        }
    }
}

// ============================================================================
// Chat Events
// ============================================================================

/// Canonical event delivered to every subscriber of a conversation
///
/// `End` and `Error` are terminal: each generation produces exactly one of
/// them and nothing after it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ChatEvent {
    /// Generation accepted and processing
    Start {
        /// Status text
        message: String,
    },

    /// A piece of answer text
    Chunk {
        /// Text to append to the answer
        content: String,
    },

    /// A piece of model reasoning
    Thinking {
        /// Reasoning text to append
        content: String,
    },

    /// A web search began
    SearchStart {
        /// The query being searched
        query: String,
    },

    /// Citable search results
    #[serde(rename = "search_results")]
    SearchResult {
        /// Assistant message the results belong to, when already known
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        /// Results with absolute http(s) URLs
        results: Vec<SearchResult>,
    },

    /// A web search finished
    SearchComplete {
        /// Number of results the backend returned
        total: usize,
    },

    /// A web search failed; generation continues without results
    SearchError {
        /// User-facing description
        message: String,
    },

    /// Generation finished and the answer was persisted
    End {
        /// Id of the persisted assistant message
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        /// Upstream finish reason
        finish_reason: String,
    },

    /// Generation failed
    Error {
        /// User-facing description; never contains internal details
        message: String,
    },
}

impl ChatEvent {
    /// Create a chunk event
    pub fn chunk(content: impl Into<String>) -> Self {
        Self::Chunk {
            content: content.into(),
        }
    }

    /// Create a thinking event
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// SSE event name for this variant
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Chunk { .. } => "chunk",
            Self::Thinking { .. } => "thinking",
            Self::SearchStart { .. } => "search_start",
            Self::SearchResult { .. } => "search_results",
            Self::SearchComplete { .. } => "search_complete",
            Self::SearchError { .. } => "search_error",
            Self::End { .. } => "end",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends a generation
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error { .. })
    }

    /// Whether this is one of the web search lifecycle events
    #[must_use]
    pub fn is_search_event(&self) -> bool {
        matches!(
            self,
            Self::SearchStart { .. }
                | Self::SearchResult { .. }
                | Self::SearchComplete { .. }
                | Self::SearchError { .. }
        )
    }

    /// JSON payload carried in the SSE `data` line
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Encode as one SSE frame, including the trailing blank line
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        let data = serde_json::to_string(&self.payload()?)?;
        Ok(format!("event: {}\ndata: {data}\n\n", self.event_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_names() {
        assert_eq!(ChatEvent::chunk("a").event_name(), "chunk");
        assert_eq!(
            ChatEvent::SearchResult {
                message_id: None,
                results: vec![]
            }
            .event_name(),
            "search_results"
        );
        assert_eq!(ChatEvent::error("x").event_name(), "error");
    }

    #[test]
    fn test_terminal_events() {
        assert!(ChatEvent::error("boom").is_terminal());
        assert!(ChatEvent::End {
            message_id: Some(MessageId(1)),
            finish_reason: "stop".into()
        }
        .is_terminal());
        assert!(!ChatEvent::chunk("hi").is_terminal());
        assert!(!ChatEvent::SearchComplete { total: 0 }.is_terminal());
    }

    #[test]
    fn test_sse_frame_uses_camel_case_payload() {
        let event = ChatEvent::End {
            message_id: Some(MessageId(42)),
            finish_reason: "stop".into(),
        };
        let frame = event.to_sse_frame().unwrap();
        assert!(frame.starts_with("event: end\ndata: "));
        assert!(frame.ends_with("\n\n"));

        let data = frame
            .trim_end()
            .strip_prefix("event: end\ndata: ")
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({"messageId": 42, "finishReason": "stop"})
        );
    }

    #[test]
    fn test_sse_frame_for_chunk() {
        let frame = ChatEvent::chunk("Hi").to_sse_frame().unwrap();
        assert_eq!(frame, "event: chunk\ndata: {\"content\":\"Hi\"}\n\n");
    }

    #[test]
    fn test_citable_urls() {
        assert!(SearchResult::new("a", "https://example.com/x", "s").is_citable());
        assert!(SearchResult::new("a", " http://example.com ", "s").is_citable());
        assert!(!SearchResult::new("a", "ftp://example.com", "s").is_citable());
        assert!(!SearchResult::new("a", "Paris is the capital", "s").is_citable());

        let summary = SearchResult {
            title: "AI summary".into(),
            url: None,
            snippet: String::new(),
            content: Some("text".into()),
            score: None,
        };
        assert!(!summary.is_citable());
    }

    #[test]
    fn test_body_prefers_content() {
        let result = SearchResult::new("t", "https://a.b", "snippet");
        assert_eq!(result.body(), "snippet");
        assert_eq!(result.clone().with_content("full").body(), "full");
        assert_eq!(result.with_content("  ").body(), "snippet");
    }
}
