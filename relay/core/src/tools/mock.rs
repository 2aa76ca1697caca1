//! Static search backend for tests and offline runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{SearchBackend, SearchError};
use crate::messages::SearchResult;

/// Backend that returns a fixed answer and counts calls
#[derive(Clone, Debug)]
pub struct StaticSearchBackend {
    answer: Result<Vec<SearchResult>, SearchError>,
    calls: Arc<AtomicUsize>,
}

impl StaticSearchBackend {
    /// Always return `results`
    #[must_use]
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            answer: Ok(results),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fail with `error`
    #[must_use]
    pub fn failing(error: SearchError) -> Self {
        Self {
            answer: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of searches run so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for StaticSearchBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(backend = "static", query, "Serving static search results");
        self.answer.clone()
    }
}
