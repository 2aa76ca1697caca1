//! Inbound Requests
//!
//! What a client asks the relay to do. The HTTP layer that accepts
//! `GET /stream/{conversationId}` deserializes its query parameters into a
//! [`GenerationRequest`] and hands it to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::messages::{ConversationId, UserId};

/// A request to generate one assistant reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Conversation the reply belongs to
    pub conversation_id: ConversationId,
    /// Requesting user, absent for anonymous requests
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// The user's message
    pub message: String,
    /// Requested provider name
    #[serde(default)]
    pub provider: Option<String>,
    /// Requested model name
    #[serde(default)]
    pub model: Option<String>,
    /// Run a web search before answering
    #[serde(default)]
    pub search_enabled: bool,
    /// Ask reasoning-capable models to think
    #[serde(default)]
    pub deep_thinking: bool,
}

impl GenerationRequest {
    /// Create a request with default options
    pub fn new(conversation_id: ConversationId, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            user_id: None,
            message: message.into(),
            provider: None,
            model: None,
            search_enabled: false,
            deep_thinking: false,
        }
    }

    /// Attribute the request to a user
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Request a specific provider
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Request a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enable or disable web search
    #[must_use]
    pub fn with_search(mut self, enabled: bool) -> Self {
        self.search_enabled = enabled;
        self
    }

    /// Enable or disable deep thinking
    #[must_use]
    pub fn with_deep_thinking(mut self, enabled: bool) -> Self {
        self.deep_thinking = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_endpoint_parameters() {
        let request: GenerationRequest = serde_json::from_value(serde_json::json!({
            "conversationId": 7,
            "message": "hello",
            "searchEnabled": true,
            "provider": "deepseek",
            "userId": 3
        }))
        .unwrap();

        assert_eq!(request.conversation_id, ConversationId(7));
        assert_eq!(request.user_id, Some(UserId(3)));
        assert_eq!(request.provider.as_deref(), Some("deepseek"));
        assert_eq!(request.model, None);
        assert!(request.search_enabled);
        assert!(!request.deep_thinking);
    }

    #[test]
    fn test_builder() {
        let request = GenerationRequest::new(ConversationId(1), "hi")
            .with_model("qwen-max")
            .with_deep_thinking(true);
        assert_eq!(request.model.as_deref(), Some("qwen-max"));
        assert!(request.deep_thinking);
        assert!(!request.search_enabled);
    }
}
