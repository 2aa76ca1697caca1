//! Provider and model definitions

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{deepseek, greatwall, openai, RetryConfig, WireFormat};

/// One model offered by a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name sent upstream
    pub name: String,

    /// Human readable name
    pub display_name: Option<String>,

    /// Whether the model may be selected
    pub enabled: bool,

    /// Whether the model can emit reasoning
    pub supports_thinking: bool,

    /// Sampling temperature override
    pub temperature: Option<f32>,

    /// Max tokens override
    pub max_tokens: Option<u32>,

    /// GreatWall workflow run id
    pub api_run_id: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            enabled: true,
            supports_thinking: false,
            temperature: None,
            max_tokens: None,
            api_run_id: None,
        }
    }
}

impl ModelConfig {
    /// Create an enabled model entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Mark the model as reasoning-capable
    #[must_use]
    pub fn with_thinking(mut self) -> Self {
        self.supports_thinking = true;
        self
    }

    /// Disable the model
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One upstream provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Human readable name
    pub display_name: Option<String>,

    /// Upstream wire format
    pub format: WireFormat,

    /// Whether the provider may be selected
    pub enabled: bool,

    /// API base URL
    pub base_url: Option<String>,

    /// Literal API key
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Path appended to the base URL; the wire format's default when unset
    pub endpoint_path: Option<String>,

    /// TCP connect timeout
    pub connect_timeout_ms: u64,

    /// Wait for response headers and for each streamed line
    pub read_timeout_ms: u64,

    /// Prefix of GreatWall per-request trace ids
    pub tpuid_prefix: String,

    /// Retry policy
    pub retry: RetryConfig,

    /// Offered models; an empty list accepts any model name
    pub models: Vec<ModelConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            format: WireFormat::OpenAi,
            enabled: true,
            base_url: None,
            api_key: None,
            api_key_env: None,
            endpoint_path: None,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
            tpuid_prefix: "relay".to_string(),
            retry: RetryConfig::default(),
            models: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// Create an enabled provider for a wire format and base URL
    pub fn new(format: WireFormat, base_url: impl Into<String>) -> Self {
        Self {
            format,
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Add a model
    #[must_use]
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.models.push(model);
        self
    }

    /// Connect timeout as a duration
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a duration
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Look up a model by name
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// First enabled model in declaration order
    #[must_use]
    pub fn first_enabled_model(&self) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.enabled)
    }

    /// Whether a model name may be used with this provider
    #[must_use]
    pub fn accepts_model(&self, name: &str) -> bool {
        if self.models.is_empty() {
            return !name.trim().is_empty();
        }
        self.model(name).is_some_and(|m| m.enabled)
    }

    /// API key from the literal setting or the configured environment variable
    ///
    /// # Errors
    ///
    /// Returns the variable name when `api_key_env` is set but not present.
    pub fn resolve_api_key(&self) -> Result<Option<String>, String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(Some(key.clone()));
        }
        match self.api_key_env.as_deref() {
            Some(var) => std::env::var(var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(Some)
                .ok_or_else(|| var.to_string()),
            None => Ok(None),
        }
    }

    /// Full streaming endpoint URL for a model
    #[must_use]
    pub fn endpoint_url(&self, model: &str) -> Option<String> {
        let base = self.base_url.as_deref()?.trim_end_matches('/');
        let path = match self.format {
            WireFormat::OpenAi => self
                .endpoint_path
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_ENDPOINT_PATH.to_string()),
            WireFormat::DeepSeek => self
                .endpoint_path
                .clone()
                .unwrap_or_else(|| deepseek::DEFAULT_ENDPOINT_PATH.to_string()),
            WireFormat::GreatWall => {
                let template = self
                    .endpoint_path
                    .as_deref()
                    .unwrap_or(greatwall::DEFAULT_ENDPOINT_PATH);
                let run_id = self.model(model).and_then(|m| m.api_run_id.as_deref());
                greatwall::endpoint_path(template, run_id)
            }
        };
        Some(format!("{base}{path}"))
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.read_timeout_ms == 0 {
            return Err("read_timeout_ms must be positive".into());
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be positive".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if self.models.iter().any(|m| m.name.trim().is_empty()) {
            return Err("every model needs a name".into());
        }
        Ok(())
    }
}
