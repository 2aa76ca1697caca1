//! Persistence boundary
//!
//! The relay does not own a database. Conversation history, tool-call records
//! and user preferences live behind these traits; [`InMemoryStore`] implements
//! all of them for the CLI and for tests.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::messages::{ConversationId, MessageId, UserId};

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Referenced record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// A tool call record was already closed
    #[error("tool call {0} already closed")]
    AlreadyClosed(ToolCallId),
}

// ============================================================================
// Conversation history
// ============================================================================

/// Author of a conversation turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human
    User,
    /// The model
    Assistant,
}

impl Role {
    /// Label used when rendering a prompt
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One persisted turn, oldest first when returned as history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

impl ConversationTurn {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation message storage
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist the user's turn before generation starts
    async fn save_user_turn(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<MessageId, StoreError>;

    /// Persist the finished assistant reply
    async fn save_assistant_turn(
        &self,
        conversation_id: ConversationId,
        content: &str,
        thinking: Option<&str>,
    ) -> Result<MessageId, StoreError>;

    /// All turns of a conversation, oldest first
    async fn history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ConversationTurn>, StoreError>;
}

// ============================================================================
// Tool call records
// ============================================================================

/// Tool call record identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCallId(pub Uuid);

impl ToolCallId {
    /// Generate a new id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool-{}", self.0)
    }
}

/// Lifecycle status of a tool call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    /// Started, no outcome yet
    Pending,
    /// Finished with output
    Completed,
    /// Finished with an error
    Failed,
}

/// Audit record of one tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Record id
    pub id: ToolCallId,
    /// Assistant message the call belongs to
    pub message_id: MessageId,
    /// Tool name, e.g. `web_search`
    pub tool_name: String,
    /// Tool input
    pub input: String,
    /// Current status
    pub status: ToolCallStatus,
    /// Output on success or error text on failure
    pub output: Option<String>,
    /// When the call started
    pub created_at: DateTime<Utc>,
    /// When the call reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tool call audit storage
///
/// A record is closed at most once; closing it again is an error.
#[async_trait]
pub trait ToolCallStore: Send + Sync {
    /// Create a pending record
    async fn open_tool_call(
        &self,
        message_id: MessageId,
        tool_name: &str,
        input: &str,
    ) -> Result<ToolCallId, StoreError>;

    /// Close a record as completed
    async fn complete_tool_call(&self, id: ToolCallId, output: &str) -> Result<(), StoreError>;

    /// Close a record as failed
    async fn fail_tool_call(&self, id: ToolCallId, error: &str) -> Result<(), StoreError>;
}

// ============================================================================
// Preferences
// ============================================================================

/// A user's preferred provider and model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPreference {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
}

/// User preference lookup
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// The user's default model, if one is stored
    async fn default_model(&self, user_id: UserId) -> Result<Option<ModelPreference>, StoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    turn: ConversationTurn,
    thinking: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_message_id: i64,
    messages: HashMap<ConversationId, Vec<StoredMessage>>,
    tool_calls: HashMap<ToolCallId, ToolCallRecord>,
    preferences: HashMap<UserId, ModelPreference>,
}

/// Process-local store implementing every persistence trait
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user's preferred model
    pub fn set_preference(&self, user_id: UserId, provider: impl Into<String>, model: impl Into<String>) {
        self.inner.lock().preferences.insert(
            user_id,
            ModelPreference {
                provider: provider.into(),
                model: model.into(),
            },
        );
    }

    /// Snapshot of a tool call record
    #[must_use]
    pub fn tool_call(&self, id: ToolCallId) -> Option<ToolCallRecord> {
        self.inner.lock().tool_calls.get(&id).cloned()
    }

    /// All tool call records for an assistant message
    #[must_use]
    pub fn tool_calls_for(&self, message_id: MessageId) -> Vec<ToolCallRecord> {
        let mut records: Vec<ToolCallRecord> = self
            .inner
            .lock()
            .tool_calls
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Number of persisted messages in a conversation
    #[must_use]
    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        self.inner
            .lock()
            .messages
            .get(&conversation_id)
            .map_or(0, Vec::len)
    }

    /// Stored reasoning of an assistant message
    #[must_use]
    pub fn thinking_of(&self, message_id: MessageId) -> Option<String> {
        self.inner
            .lock()
            .messages
            .values()
            .flatten()
            .find(|m| m.id == message_id)
            .and_then(|m| m.thinking.clone())
    }

    fn append(&self, conversation_id: ConversationId, turn: ConversationTurn, thinking: Option<String>) -> MessageId {
        let mut inner = self.inner.lock();
        inner.next_message_id += 1;
        let id = MessageId(inner.next_message_id);
        inner
            .messages
            .entry(conversation_id)
            .or_default()
            .push(StoredMessage { id, turn, thinking });
        id
    }

    fn close_tool_call(&self, id: ToolCallId, status: ToolCallStatus, output: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .tool_calls
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if record.status != ToolCallStatus::Pending {
            return Err(StoreError::AlreadyClosed(id));
        }
        record.status = status;
        record.output = Some(output.to_string());
        record.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn save_user_turn(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<MessageId, StoreError> {
        Ok(self.append(conversation_id, ConversationTurn::user(content), None))
    }

    async fn save_assistant_turn(
        &self,
        conversation_id: ConversationId,
        content: &str,
        thinking: Option<&str>,
    ) -> Result<MessageId, StoreError> {
        Ok(self.append(
            conversation_id,
            ConversationTurn::assistant(content),
            thinking.map(str::to_string),
        ))
    }

    async fn history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(self
            .inner
            .lock()
            .messages
            .get(&conversation_id)
            .map(|messages| messages.iter().map(|m| m.turn.clone()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ToolCallStore for InMemoryStore {
    async fn open_tool_call(
        &self,
        message_id: MessageId,
        tool_name: &str,
        input: &str,
    ) -> Result<ToolCallId, StoreError> {
        let id = ToolCallId::new();
        self.inner.lock().tool_calls.insert(
            id,
            ToolCallRecord {
                id,
                message_id,
                tool_name: tool_name.to_string(),
                input: input.to_string(),
                status: ToolCallStatus::Pending,
                output: None,
                created_at: Utc::now(),
                completed_at: None,
            },
        );
        Ok(id)
    }

    async fn complete_tool_call(&self, id: ToolCallId, output: &str) -> Result<(), StoreError> {
        self.close_tool_call(id, ToolCallStatus::Completed, output)
    }

    async fn fail_tool_call(&self, id: ToolCallId, error: &str) -> Result<(), StoreError> {
        self.close_tool_call(id, ToolCallStatus::Failed, error)
    }
}

#[async_trait]
impl PreferenceStore for InMemoryStore {
    async fn default_model(&self, user_id: UserId) -> Result<Option<ModelPreference>, StoreError> {
        Ok(self.inner.lock().preferences.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_history_is_ordered() {
        let store = InMemoryStore::new();
        let conv = ConversationId(1);

        store.save_user_turn(conv, "hi").await.unwrap();
        let reply = store
            .save_assistant_turn(conv, "hello", Some("greeting"))
            .await
            .unwrap();
        store.save_user_turn(ConversationId(2), "other").await.unwrap();

        let history = store.history(conv).await.unwrap();
        assert_eq!(
            history,
            vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")]
        );
        assert_eq!(store.message_count(conv), 2);
        assert_eq!(store.thinking_of(reply).as_deref(), Some("greeting"));
    }

    #[tokio::test]
    async fn test_tool_call_closes_once() {
        let store = InMemoryStore::new();
        let id = store
            .open_tool_call(MessageId(5), "web_search", "rust")
            .await
            .unwrap();
        assert_eq!(store.tool_call(id).unwrap().status, ToolCallStatus::Pending);

        store.complete_tool_call(id, "[]").await.unwrap();
        let record = store.tool_call(id).unwrap();
        assert_eq!(record.status, ToolCallStatus::Completed);
        assert_eq!(record.output.as_deref(), Some("[]"));
        assert!(record.completed_at.is_some());

        let again = store.fail_tool_call(id, "late").await;
        assert!(matches!(again, Err(StoreError::AlreadyClosed(closed)) if closed == id));
        assert_eq!(store.tool_call(id).unwrap().status, ToolCallStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_tool_call() {
        let store = InMemoryStore::new();
        let result = store.complete_tool_call(ToolCallId::new(), "x").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_preferences() {
        let store = InMemoryStore::new();
        assert_eq!(store.default_model(UserId(1)).await.unwrap(), None);

        store.set_preference(UserId(1), "deepseek", "deepseek-chat");
        assert_eq!(
            store.default_model(UserId(1)).await.unwrap(),
            Some(ModelPreference {
                provider: "deepseek".into(),
                model: "deepseek-chat".into()
            })
        );
    }
}
