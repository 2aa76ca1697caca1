//! Web search tool
//!
//! One invocation moves through `Idle -> Started -> Completed | Failed` and
//! reports progress to an [`EventSink`]:
//!
//! ```text
//! success: search_start -> search_results (citable only, if any) -> search_complete
//! failure: search_start -> search_error
//! ```
//!
//! Failures never propagate: the caller gets empty results and carries on.
//!
//! # Context scope
//!
//! The call budget, the query cache and tool-call records live in the
//! [`ToolContext`] the caller passes in. [`StreamOrchestrator`] searches once
//! per generation, before the reply message exists, with a fresh context and
//! no message id, so on that path none of the three comes into play. They
//! apply to embedders that keep one context across several invocations (a
//! model-driven tool loop) and know the message id being answered.
//!
//! [`StreamOrchestrator`]: crate::orchestrator::StreamOrchestrator

use std::collections::HashMap;
use std::sync::Arc;

use super::{EventSink, SearchBackend, SearchError};
use crate::config::SearchConfig;
use crate::messages::{ChatEvent, ConversationId, MessageId, SearchResult};
use crate::prompt::format_search_results;
use crate::store::{ToolCallId, ToolCallStore};

/// Name recorded on tool call records
pub const TOOL_NAME: &str = "web_search";

/// Message sent to clients when a search fails
pub const SEARCH_UNAVAILABLE_MESSAGE: &str =
    "Web search is temporarily unavailable, please try again later";

const LIMIT_REACHED_TITLE: &str = "Search limit reached";

/// Lifecycle of one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchState {
    /// Nothing was searched (disabled or over budget)
    Idle,
    /// Backend call in progress
    Started,
    /// Results delivered
    Completed,
    /// Backend failed; results are empty
    Failed,
}

/// Per-generation context for tool invocations
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Conversation being answered
    pub conversation_id: ConversationId,
    /// Assistant message the results belong to, when already persisted
    pub message_id: Option<MessageId>,
    /// Whether the requester enabled search
    pub search_enabled: bool,
    calls: u32,
    cache: HashMap<String, Vec<SearchResult>>,
}

impl ToolContext {
    /// Fresh context with an unused budget
    #[must_use]
    pub fn new(conversation_id: ConversationId, search_enabled: bool) -> Self {
        Self {
            conversation_id,
            message_id: None,
            search_enabled,
            calls: 0,
            cache: HashMap::new(),
        }
    }

    /// Attach the assistant message id
    #[must_use]
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Invocations counted against the budget so far
    #[must_use]
    pub fn calls_made(&self) -> u32 {
        self.calls
    }
}

fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Result of one invocation
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Everything the backend returned, citable or not
    pub results: Vec<SearchResult>,
    /// Final state
    pub state: SearchState,
}

impl SearchOutcome {
    fn idle(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            state: SearchState::Idle,
        }
    }

    /// Results that may be shown as citations
    #[must_use]
    pub fn citations(&self) -> Vec<SearchResult> {
        citable(&self.results)
    }

    /// Prompt context block, `None` when there is nothing to add
    #[must_use]
    pub fn context(&self) -> Option<String> {
        if self.results.is_empty() {
            return None;
        }
        Some(format_search_results(&self.results))
    }
}

fn citable(results: &[SearchResult]) -> Vec<SearchResult> {
    results.iter().filter(|r| r.is_citable()).cloned().collect()
}

/// Web search with event reporting, budget and audit records
#[derive(Clone)]
pub struct WebSearchTool {
    backend: Option<Arc<dyn SearchBackend>>,
    records: Option<Arc<dyn ToolCallStore>>,
    max_tool_calls: u32,
}

impl WebSearchTool {
    /// Tool without a backend; every enabled invocation fails softly
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            backend: None,
            records: None,
            max_tool_calls: config.max_tool_calls.max(1),
        }
    }

    /// Use `backend` for searches
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Record invocations in `records`
    ///
    /// Records are written only for contexts carrying a message id.
    #[must_use]
    pub fn with_records(mut self, records: Arc<dyn ToolCallStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Whether a backend is attached
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Run a search for `query`
    pub async fn invoke(
        &self,
        query: &str,
        ctx: &mut ToolContext,
        sink: &dyn EventSink,
    ) -> SearchOutcome {
        if !ctx.search_enabled {
            tracing::debug!(conversation_id = %ctx.conversation_id, "Search disabled, skipping");
            return SearchOutcome::idle(Vec::new());
        }

        if ctx.calls >= self.max_tool_calls {
            tracing::warn!(
                conversation_id = %ctx.conversation_id,
                limit = self.max_tool_calls,
                "Search budget exhausted"
            );
            return SearchOutcome::idle(vec![self.limit_reached()]);
        }
        ctx.calls += 1;

        let key = normalize_query(query);
        if let Some(cached) = ctx.cache.get(&key).cloned() {
            tracing::debug!(
                conversation_id = %ctx.conversation_id,
                results = cached.len(),
                "Search cache hit"
            );
            sink.emit(ChatEvent::SearchStart {
                query: query.to_string(),
            })
            .await;
            self.report_results(&cached, ctx, sink).await;
            return SearchOutcome {
                results: cached,
                state: SearchState::Completed,
            };
        }

        let record = self.open_record(query, ctx).await;

        sink.emit(ChatEvent::SearchStart {
            query: query.to_string(),
        })
        .await;
        tracing::info!(conversation_id = %ctx.conversation_id, query, "Web search started");

        let outcome = match &self.backend {
            Some(backend) => backend.search(query).await,
            None => Err(SearchError::NotConfigured),
        };

        match outcome {
            Ok(results) => {
                ctx.cache.insert(key, results.clone());
                self.close_record_ok(record, &results).await;
                self.report_results(&results, ctx, sink).await;
                tracing::info!(
                    conversation_id = %ctx.conversation_id,
                    total = results.len(),
                    "Web search completed"
                );
                SearchOutcome {
                    results,
                    state: SearchState::Completed,
                }
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %ctx.conversation_id,
                    error = %e,
                    "Web search failed"
                );
                self.close_record_err(record, &e).await;
                sink.emit(ChatEvent::SearchError {
                    message: SEARCH_UNAVAILABLE_MESSAGE.to_string(),
                })
                .await;
                SearchOutcome {
                    results: Vec::new(),
                    state: SearchState::Failed,
                }
            }
        }
    }

    async fn report_results(&self, results: &[SearchResult], ctx: &ToolContext, sink: &dyn EventSink) {
        let citations = citable(results);
        if !citations.is_empty() {
            sink.emit(ChatEvent::SearchResult {
                message_id: ctx.message_id,
                results: citations,
            })
            .await;
        }
        sink.emit(ChatEvent::SearchComplete {
            total: results.len(),
        })
        .await;
    }

    fn limit_reached(&self) -> SearchResult {
        SearchResult {
            title: LIMIT_REACHED_TITLE.to_string(),
            url: None,
            snippet: format!(
                "The search limit of {} calls was reached. Answer from the results already \
                 available and do not search again.",
                self.max_tool_calls
            ),
            content: None,
            score: None,
        }
    }

    async fn open_record(&self, query: &str, ctx: &ToolContext) -> Option<(Arc<dyn ToolCallStore>, ToolCallId)> {
        let records = self.records.as_ref()?;
        let message_id = ctx.message_id?;
        match records.open_tool_call(message_id, TOOL_NAME, query).await {
            Ok(id) => Some((Arc::clone(records), id)),
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "Could not open tool call record");
                None
            }
        }
    }

    async fn close_record_ok(
        &self,
        record: Option<(Arc<dyn ToolCallStore>, ToolCallId)>,
        results: &[SearchResult],
    ) {
        let Some((records, id)) = record else { return };
        let output = serde_json::to_string(results).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not serialize search results");
            "[]".to_string()
        });
        if let Err(e) = records.complete_tool_call(id, &output).await {
            tracing::warn!(tool_call = %id, error = %e, "Could not complete tool call record");
        }
    }

    async fn close_record_err(&self, record: Option<(Arc<dyn ToolCallStore>, ToolCallId)>, error: &SearchError) {
        let Some((records, id)) = record else { return };
        if let Err(e) = records.fail_tool_call(id, &error.to_string()).await {
            tracing::warn!(tool_call = %id, error = %e, "Could not fail tool call record");
        }
    }
}
