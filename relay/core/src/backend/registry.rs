//! Adapter registry
//!
//! Maps provider names to adapters. Built once at startup and immutable
//! afterwards, so lookups need no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::http::HttpProviderAdapter;
use super::traits::ProviderAdapter;
use crate::config::{ModelConfig, ProviderConfig, RelayConfig};

/// A registered provider
#[derive(Clone)]
pub struct ProviderEntry {
    /// Streaming adapter
    pub adapter: Arc<dyn ProviderAdapter>,
    /// Provider definition (models, defaults)
    pub config: ProviderConfig,
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("adapter", &self.adapter.name())
            .field("format", &self.adapter.wire_format())
            .field("models", &self.config.models.len())
            .finish()
    }
}

/// Immutable provider name → adapter map
#[derive(Clone, Debug, Default)]
pub struct AdapterRegistry {
    providers: HashMap<String, ProviderEntry>,
}

impl AdapterRegistry {
    /// Build HTTP adapters for every usable provider in the configuration
    ///
    /// Disabled providers and providers that cannot be built (no base URL,
    /// missing API key) are skipped and logged.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        let mut builder = Self::builder();
        for (name, provider) in &config.providers {
            if !provider.enabled {
                tracing::info!(provider = %name, "Provider disabled, not registering");
                continue;
            }
            match HttpProviderAdapter::new(name.clone(), provider.clone()) {
                Ok(adapter) => {
                    builder = builder.register(name.clone(), Arc::new(adapter), provider.clone());
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "Skipping unusable provider");
                }
            }
        }
        builder.build()
    }

    /// Start building a registry by hand
    #[must_use]
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Look up a provider
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(name)
    }

    /// Adapter for a provider
    #[must_use]
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(name).map(|e| Arc::clone(&e.adapter))
    }

    /// Model definition, if the provider lists it
    #[must_use]
    pub fn model(&self, provider: &str, model: &str) -> Option<&ModelConfig> {
        self.providers.get(provider)?.config.model(model)
    }

    /// Check if a provider is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Builder for [`AdapterRegistry`]
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    providers: HashMap<String, ProviderEntry>,
}

impl AdapterRegistryBuilder {
    /// Register an adapter under a provider name
    ///
    /// A disabled provider definition is ignored.
    #[must_use]
    pub fn register(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
        config: ProviderConfig,
    ) -> Self {
        let name = name.into();
        if config.enabled {
            self.providers.insert(name, ProviderEntry { adapter, config });
        } else {
            tracing::debug!(provider = %name, "Ignoring disabled provider");
        }
        self
    }

    /// Freeze the registry
    #[must_use]
    pub fn build(self) -> AdapterRegistry {
        let registry = AdapterRegistry {
            providers: self.providers,
        };
        tracing::info!(
            count = registry.len(),
            providers = ?registry.provider_names(),
            "Provider registry initialized"
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ScriptedAdapter, WireFormat};

    fn scripted(name: &str) -> Arc<dyn ProviderAdapter> {
        Arc::new(ScriptedAdapter::echo(name, "hi"))
    }

    #[test]
    fn test_builder_registers_enabled_only() {
        let registry = AdapterRegistry::builder()
            .register("a", scripted("a"), ProviderConfig::default())
            .register(
                "b",
                scripted("b"),
                ProviderConfig {
                    enabled: false,
                    ..ProviderConfig::default()
                },
            )
            .build();

        assert_eq!(registry.provider_names(), vec!["a".to_string()]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert_eq!(registry.adapter("a").unwrap().name(), "a");
    }

    #[test]
    fn test_from_config_skips_unusable_providers() {
        let config = RelayConfig::from_toml_str(
            r#"
[providers.deepseek]
format = "deepseek"
base_url = "https://api.deepseek.com"

[[providers.deepseek.models]]
name = "deepseek-chat"

[providers.nourl]
format = "openai"

[providers.off]
base_url = "https://off.example.com"
enabled = false

[providers.nokey]
base_url = "https://nokey.example.com"
api_key_env = "RELAY_TEST_UNSET_REGISTRY_KEY"
"#,
        )
        .unwrap();

        let registry = AdapterRegistry::from_config(&config);
        assert_eq!(registry.provider_names(), vec!["deepseek".to_string()]);
        assert_eq!(
            registry.adapter("deepseek").unwrap().wire_format(),
            WireFormat::DeepSeek
        );
        assert!(registry.model("deepseek", "deepseek-chat").is_some());
        assert!(registry.model("deepseek", "other").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = AdapterRegistry::from_config(&RelayConfig::default());
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
