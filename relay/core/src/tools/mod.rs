//! Tools
//!
//! Capabilities the pipeline can invoke before calling the model. Currently
//! only web search, backed by a pluggable [`SearchBackend`].

pub mod mock;
pub mod tavily;
pub mod web_search;

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::{ChatEvent, SearchResult};

pub use mock::StaticSearchBackend;
pub use tavily::TavilySearchBackend;
pub use web_search::{
    SearchOutcome, SearchState, ToolContext, WebSearchTool, SEARCH_UNAVAILABLE_MESSAGE, TOOL_NAME,
};

/// Search backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Backend answered with a non-success status
    #[error("search backend returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Response body could not be parsed
    #[error("search response could not be decoded: {0}")]
    Decode(String),

    /// Request never produced a response
    #[error("search request failed: {0}")]
    Transport(String),

    /// No backend or credentials configured
    #[error("no search backend configured")]
    NotConfigured,
}

/// A web search provider
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Run one query
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Receives events a tool emits while it runs
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event, in order
    async fn emit(&self, event: ChatEvent);
}
