//! Model selection
//!
//! Resolves which provider and model serve a request. Candidates are tried in
//! order and the first one that names a registered provider and an enabled
//! model wins:
//!
//! 1. what the request asked for
//! 2. the user's stored preference
//! 3. the system default from configuration

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::AdapterRegistry;
use crate::config::DefaultsConfig;
use crate::messages::UserId;
use crate::store::PreferenceStore;

/// No usable provider/model could be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Nothing in the request, preferences or defaults is registered and enabled
    #[error("no enabled provider available (requested provider {requested_provider:?}, model {requested_model:?})")]
    NoProviderAvailable {
        /// Provider the request named
        requested_provider: Option<String>,
        /// Model the request named
        requested_model: Option<String>,
    },
}

/// A resolved provider and model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSelection {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Resolves provider and model for a request
#[derive(Clone)]
pub struct ModelSelector {
    registry: Arc<AdapterRegistry>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    defaults: DefaultsConfig,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ModelSelector {
    /// Create a selector
    #[must_use]
    pub fn new(
        registry: Arc<AdapterRegistry>,
        preferences: Option<Arc<dyn PreferenceStore>>,
        defaults: DefaultsConfig,
    ) -> Self {
        Self {
            registry,
            preferences,
            defaults,
        }
    }

    /// Resolve for a signed-in user
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoProviderAvailable`] when no candidate
    /// resolves.
    pub async fn select_model_for_user(
        &self,
        user_id: UserId,
        requested_provider: Option<&str>,
        requested_model: Option<&str>,
    ) -> Result<ModelSelection, SelectionError> {
        let requested_provider = non_blank(requested_provider);
        let requested_model = non_blank(requested_model);

        if let Some(selection) = self.resolve_requested(requested_provider, requested_model) {
            return Ok(selection);
        }

        if let Some(selection) = self.resolve_preference(user_id).await {
            return Ok(selection);
        }

        self.resolve_default()
            .ok_or_else(|| Self::unavailable(requested_provider, requested_model))
    }

    /// Resolve for an anonymous request
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoProviderAvailable`] when no candidate
    /// resolves.
    pub fn select_model_for_anonymous(
        &self,
        requested_provider: Option<&str>,
        requested_model: Option<&str>,
    ) -> Result<ModelSelection, SelectionError> {
        let requested_provider = non_blank(requested_provider);
        let requested_model = non_blank(requested_model);

        self.resolve_requested(requested_provider, requested_model)
            .or_else(|| self.resolve_default())
            .ok_or_else(|| Self::unavailable(requested_provider, requested_model))
    }

    fn unavailable(provider: Option<&str>, model: Option<&str>) -> SelectionError {
        tracing::warn!(?provider, ?model, "No provider could serve the request");
        SelectionError::NoProviderAvailable {
            requested_provider: provider.map(str::to_string),
            requested_model: model.map(str::to_string),
        }
    }

    /// `provider` + `model`, or the provider's first enabled model when the
    /// model is omitted
    fn resolve(&self, provider: &str, model: Option<&str>) -> Option<ModelSelection> {
        let entry = self.registry.get(provider)?;
        let model = match model {
            Some(model) if entry.config.accepts_model(model) => model.to_string(),
            Some(_) => return None,
            None => entry.config.first_enabled_model()?.name.clone(),
        };
        Some(ModelSelection {
            provider: provider.to_string(),
            model,
        })
    }

    fn resolve_requested(&self, provider: Option<&str>, model: Option<&str>) -> Option<ModelSelection> {
        let selection = match (provider, model) {
            (Some(provider), model) => self.resolve(provider, model),
            (None, Some(model)) => self.resolve(&self.defaults.provider, Some(model)),
            (None, None) => None,
        };
        if selection.is_none() && (provider.is_some() || model.is_some()) {
            tracing::debug!(?provider, ?model, "Requested model not available, falling back");
        }
        selection
    }

    async fn resolve_preference(&self, user_id: UserId) -> Option<ModelSelection> {
        let store = self.preferences.as_ref()?;
        match store.default_model(user_id).await {
            Ok(Some(pref)) => {
                let selection = self.resolve(&pref.provider, non_blank(Some(&pref.model)));
                if selection.is_none() {
                    tracing::debug!(
                        user_id = %user_id,
                        provider = %pref.provider,
                        model = %pref.model,
                        "Stored preference no longer available"
                    );
                }
                selection
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read model preference");
                None
            }
        }
    }

    fn resolve_default(&self) -> Option<ModelSelection> {
        self.resolve(&self.defaults.provider, non_blank(self.defaults.model.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ProviderAdapter, ScriptedAdapter};
    use crate::config::{ModelConfig, ProviderConfig};
    use crate::store::{InMemoryStore, ModelPreference, StoreError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn adapter(name: &str) -> Arc<dyn ProviderAdapter> {
        Arc::new(ScriptedAdapter::echo(name, "ok"))
    }

    fn registry() -> Arc<AdapterRegistry> {
        Arc::new(
            AdapterRegistry::builder()
                .register(
                    "qwen",
                    adapter("qwen"),
                    ProviderConfig::default()
                        .with_model(ModelConfig::new("qwen-turbo").disabled())
                        .with_model(ModelConfig::new("qwen-plus"))
                        .with_model(ModelConfig::new("qwen-max")),
                )
                .register(
                    "deepseek",
                    adapter("deepseek"),
                    ProviderConfig::default()
                        .with_model(ModelConfig::new("deepseek-chat"))
                        .with_model(ModelConfig::new("deepseek-reasoner").with_thinking()),
                )
                .register(
                    "offline",
                    adapter("offline"),
                    ProviderConfig {
                        enabled: false,
                        ..ProviderConfig::default().with_model(ModelConfig::new("m"))
                    },
                )
                .build(),
        )
    }

    fn selector(preferences: Option<Arc<dyn PreferenceStore>>) -> ModelSelector {
        ModelSelector::new(registry(), preferences, DefaultsConfig::default())
    }

    fn sel(provider: &str, model: &str) -> ModelSelection {
        ModelSelection {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn test_explicit_request_wins() {
        let selector = selector(None);
        assert_eq!(
            selector
                .select_model_for_anonymous(Some("deepseek"), Some("deepseek-reasoner"))
                .unwrap(),
            sel("deepseek", "deepseek-reasoner")
        );
    }

    #[test]
    fn test_provider_without_model_uses_first_enabled() {
        let selector = selector(None);
        assert_eq!(
            selector.select_model_for_anonymous(Some("qwen"), None).unwrap(),
            sel("qwen", "qwen-plus")
        );
    }

    #[test]
    fn test_model_without_provider_uses_default_provider() {
        let selector = selector(None);
        assert_eq!(
            selector.select_model_for_anonymous(None, Some("qwen-max")).unwrap(),
            sel("qwen", "qwen-max")
        );
    }

    #[test]
    fn test_disabled_or_unknown_falls_back_to_default() {
        let selector = selector(None);
        for (provider, model) in [
            (Some("offline"), Some("m")),
            (Some("missing"), None),
            (Some("qwen"), Some("qwen-turbo")),
            (Some(" "), Some("")),
        ] {
            assert_eq!(
                selector.select_model_for_anonymous(provider, model).unwrap(),
                sel("qwen", "qwen-plus"),
                "request {provider:?}/{model:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_user_preference_beats_default() {
        let store = Arc::new(InMemoryStore::new());
        store.set_preference(UserId(9), "deepseek", "deepseek-chat");
        let selector = selector(Some(store));

        assert_eq!(
            selector.select_model_for_user(UserId(9), None, None).await.unwrap(),
            sel("deepseek", "deepseek-chat")
        );
        assert_eq!(
            selector
                .select_model_for_user(UserId(9), Some("qwen"), Some("qwen-max"))
                .await
                .unwrap(),
            sel("qwen", "qwen-max")
        );
        assert_eq!(
            selector.select_model_for_user(UserId(1), None, None).await.unwrap(),
            sel("qwen", "qwen-plus")
        );
    }

    struct BrokenPreferences;

    #[async_trait]
    impl PreferenceStore for BrokenPreferences {
        async fn default_model(&self, _: UserId) -> Result<Option<ModelPreference>, StoreError> {
            Err(StoreError::Unavailable("db down".into()))
        }
    }

    #[tokio::test]
    async fn test_preference_failure_is_skipped() {
        let selector = selector(Some(Arc::new(BrokenPreferences)));
        assert_eq!(
            selector.select_model_for_user(UserId(1), None, None).await.unwrap(),
            sel("qwen", "qwen-plus")
        );
    }

    #[test]
    fn test_nothing_available() {
        let selector = ModelSelector::new(
            Arc::new(AdapterRegistry::default()),
            None,
            DefaultsConfig::default(),
        );
        let err = selector
            .select_model_for_anonymous(Some("deepseek"), None)
            .unwrap_err();
        assert_eq!(
            err,
            SelectionError::NoProviderAvailable {
                requested_provider: Some("deepseek".into()),
                requested_model: None
            }
        );
    }
}
