//! TOML Configuration File Support
//!
//! Centralized configuration for the relay, loaded from
//! `~/.config/relay/relay.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [defaults]
//! provider = "deepseek"
//! temperature = 0.7
//! max_tokens = 2000
//!
//! [chat]
//! max_history_turns = 10
//! response_timeout_secs = 300
//!
//! [search]
//! enabled = true
//! api_key_env = "TAVILY_API_KEY"
//! max_tool_calls = 3
//!
//! [providers.deepseek]
//! format = "deepseek"
//! base_url = "https://api.deepseek.com"
//! api_key_env = "DEEPSEEK_API_KEY"
//! read_timeout_ms = 30000
//!
//! [[providers.deepseek.models]]
//! name = "deepseek-chat"
//!
//! [[providers.deepseek.models]]
//! name = "deepseek-reasoner"
//! supports_thinking = true
//! ```

mod provider;

pub use provider::{ModelConfig, ProviderConfig};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[defaults]` section: system-wide model fallback
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsToml {
    /// Default provider name
    pub provider: Option<String>,

    /// Default model name; the provider's first enabled model when unset
    pub model: Option<String>,

    /// Sampling temperature for models without their own
    pub temperature: Option<f32>,

    /// Max tokens for models without their own
    pub max_tokens: Option<u32>,

    /// Reasoning budget when deep thinking is requested
    pub thinking_budget: Option<u32>,
}

/// `[chat]` section: pipeline and fan-out tuning
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Prior turns included in the prompt
    pub max_history_turns: Option<usize>,

    /// Upper bound on one upstream generation, in seconds
    pub response_timeout_secs: Option<u64>,

    /// Per-subscriber event queue capacity
    pub subscriber_buffer: Option<usize>,

    /// How long a full subscriber queue may block delivery, in milliseconds
    pub subscriber_send_timeout_ms: Option<u64>,

    /// Recent events replayed to late subscribers (0 disables)
    pub replay_buffer: Option<usize>,

    /// Instruction placed at the top of every prompt
    pub system_preamble: Option<String>,
}

/// `[search]` section: web search tool
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchToml {
    /// Whether the search tool is available at all
    pub enabled: Option<bool>,

    /// Search API endpoint
    pub base_url: Option<String>,

    /// Literal API key
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Searches allowed per generation
    pub max_tool_calls: Option<u32>,

    /// Results requested per search
    pub max_results: Option<u32>,

    /// Search request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayToml {
    /// Model fallback section
    pub defaults: DefaultsToml,

    /// Pipeline section
    pub chat: ChatToml,

    /// Search section
    pub search: SearchToml,

    /// Provider definitions keyed by provider name
    pub providers: BTreeMap<String, ProviderConfig>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Default instruction placed at the top of every prompt
pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant. Answer accurately and concisely. \
When search results are provided, base your answer on them and cite the sources you use.";

/// System-wide model fallback
#[derive(Clone, Debug, PartialEq)]
pub struct DefaultsConfig {
    /// Default provider name
    pub provider: String,
    /// Default model name
    pub model: Option<String>,
    /// Default sampling temperature
    pub temperature: f32,
    /// Default max tokens
    pub max_tokens: u32,
    /// Reasoning budget when deep thinking is requested
    pub thinking_budget: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "qwen".to_string(),
            model: None,
            temperature: 0.7,
            max_tokens: 2000,
            thinking_budget: 50_000,
        }
    }
}

/// Pipeline and fan-out settings
#[derive(Clone, Debug, PartialEq)]
pub struct ChatConfig {
    /// Prior turns included in the prompt
    pub max_history_turns: usize,
    /// Upper bound on one upstream generation
    pub response_timeout: Duration,
    /// Per-subscriber event queue capacity
    pub subscriber_buffer: usize,
    /// How long a full subscriber queue may block delivery
    pub subscriber_send_timeout: Duration,
    /// Recent events replayed to late subscribers
    pub replay_buffer: usize,
    /// Instruction placed at the top of every prompt
    pub system_preamble: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_turns: 10,
            response_timeout: Duration::from_secs(300),
            subscriber_buffer: 256,
            subscriber_send_timeout: Duration::from_secs(5),
            replay_buffer: 0,
            system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
        }
    }
}

/// Web search settings
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Whether the search tool is available at all
    pub enabled: bool,
    /// Search API endpoint
    pub base_url: String,
    /// Literal API key
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Searches allowed per generation
    pub max_tool_calls: u32,
    /// Results requested per search
    pub max_results: u32,
    /// Search request timeout
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.tavily.com/search".to_string(),
            api_key: None,
            api_key_env: Some("TAVILY_API_KEY".to_string()),
            max_tool_calls: 3,
            max_results: 5,
            timeout: Duration::from_secs(15),
        }
    }
}

impl SearchConfig {
    /// API key from the literal setting or the configured environment variable
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

/// Centralized configuration for the relay
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Model fallback
    pub defaults: DefaultsConfig,

    /// Pipeline settings
    pub chat: ChatConfig,

    /// Search settings
    pub search: SearchConfig,

    /// Provider definitions keyed by provider name
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            chat: ChatConfig::default(),
            search: SearchConfig::default(),
            providers: BTreeMap::new(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RelayConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document on top of the defaults, without environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let toml_config: RelayToml = toml::from_str(content)?;
        let mut config = Self::default();
        apply_toml_config(&mut config, toml_config);
        config.source = ConfigSource::File;
        config.validate()?;
        Ok(config)
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "defaults.provider must not be empty".into(),
            ));
        }
        if self.chat.subscriber_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "chat.subscriber_buffer must be at least 1".into(),
            ));
        }
        if self.chat.response_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "chat.response_timeout_secs must be positive".into(),
            ));
        }
        for (name, provider) in &self.providers {
            provider
                .validate()
                .map_err(|reason| ConfigError::ValidationError(format!("providers.{name}: {reason}")))?;
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/relay/relay.toml` or `~/.config/relay/relay.toml`
/// if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("relay").join("relay.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the merged configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: RelayToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                providers = config.providers.len(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut RelayConfig, toml: RelayToml) {
    let RelayToml {
        defaults,
        chat,
        search,
        providers,
    } = toml;

    if let Some(provider) = defaults.provider {
        config.defaults.provider = provider;
    }
    if defaults.model.is_some() {
        config.defaults.model = defaults.model;
    }
    if let Some(temperature) = defaults.temperature {
        config.defaults.temperature = temperature;
    }
    if let Some(max_tokens) = defaults.max_tokens {
        config.defaults.max_tokens = max_tokens;
    }
    if let Some(budget) = defaults.thinking_budget {
        config.defaults.thinking_budget = budget;
    }

    if let Some(turns) = chat.max_history_turns {
        config.chat.max_history_turns = turns;
    }
    if let Some(secs) = chat.response_timeout_secs {
        config.chat.response_timeout = Duration::from_secs(secs);
    }
    if let Some(buffer) = chat.subscriber_buffer {
        config.chat.subscriber_buffer = buffer;
    }
    if let Some(ms) = chat.subscriber_send_timeout_ms {
        config.chat.subscriber_send_timeout = Duration::from_millis(ms);
    }
    if let Some(replay) = chat.replay_buffer {
        config.chat.replay_buffer = replay;
    }
    if let Some(preamble) = chat.system_preamble {
        config.chat.system_preamble = preamble;
    }

    if let Some(enabled) = search.enabled {
        config.search.enabled = enabled;
    }
    if let Some(url) = search.base_url {
        config.search.base_url = url;
    }
    if search.api_key.is_some() {
        config.search.api_key = search.api_key;
    }
    if search.api_key_env.is_some() {
        config.search.api_key_env = search.api_key_env;
    }
    if let Some(max) = search.max_tool_calls {
        config.search.max_tool_calls = max;
    }
    if let Some(max) = search.max_results {
        config.search.max_results = max;
    }
    if let Some(ms) = search.timeout_ms {
        config.search.timeout = Duration::from_millis(ms);
    }

    config.providers.extend(providers);
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut RelayConfig) {
    if let Ok(provider) = std::env::var("RELAY_DEFAULT_PROVIDER") {
        config.defaults.provider = provider;
        config.source = ConfigSource::Env;
    }
    if let Ok(model) = std::env::var("RELAY_DEFAULT_MODEL") {
        config.defaults.model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Ok(turns) = std::env::var("RELAY_MAX_HISTORY_TURNS") {
        if let Ok(n) = turns.parse::<usize>() {
            config.chat.max_history_turns = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(timeout) = std::env::var("RELAY_RESPONSE_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.chat.response_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(enabled) = std::env::var("RELAY_SEARCH_ENABLED") {
        config.search.enabled = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Ok(key) = std::env::var("RELAY_SEARCH_API_KEY") {
        config.search.api_key = Some(key);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Default provider override
    pub default_provider: Option<String>,

    /// Default model override
    pub default_model: Option<String>,

    /// History window override
    pub max_history_turns: Option<usize>,

    /// Search availability override
    pub search_enabled: Option<bool>,

    /// Response timeout override (seconds)
    pub response_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default provider override
    #[must_use]
    pub fn with_default_provider(mut self, provider: String) -> Self {
        self.default_provider = Some(provider);
        self
    }

    /// Set default model override
    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = Some(model);
        self
    }

    /// Set history window override
    #[must_use]
    pub fn with_max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = Some(turns);
        self
    }

    /// Set search availability override
    #[must_use]
    pub fn with_search_enabled(mut self, enabled: bool) -> Self {
        self.search_enabled = Some(enabled);
        self
    }

    /// Set response timeout override
    #[must_use]
    pub fn with_response_timeout_secs(mut self, secs: u64) -> Self {
        self.response_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut RelayConfig) {
        if self.default_provider.is_some()
            || self.default_model.is_some()
            || self.max_history_turns.is_some()
            || self.search_enabled.is_some()
            || self.response_timeout_secs.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref provider) = self.default_provider {
            config.defaults.provider.clone_from(provider);
        }
        if let Some(ref model) = self.default_model {
            config.defaults.model = Some(model.clone());
        }
        if let Some(turns) = self.max_history_turns {
            config.chat.max_history_turns = turns;
        }
        if let Some(enabled) = self.search_enabled {
            config.search.enabled = enabled;
        }
        if let Some(secs) = self.response_timeout_secs {
            config.chat.response_timeout = Duration::from_secs(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WireFormat;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.defaults.provider, "qwen");
        assert!((config.defaults.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.defaults.max_tokens, 2000);
        assert_eq!(config.chat.max_history_turns, 10);
        assert_eq!(config.chat.response_timeout, Duration::from_secs(300));
        assert_eq!(config.search.max_tool_calls, 3);
        assert!(config.providers.is_empty());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("relay"));
            assert!(p.to_string_lossy().ends_with("relay.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_full_toml() {
        let config = RelayConfig::from_toml_str(
            r#"
[defaults]
provider = "deepseek"
model = "deepseek-chat"
max_tokens = 4096

[chat]
max_history_turns = 4
response_timeout_secs = 60
replay_buffer = 8

[search]
enabled = false
max_tool_calls = 1

[providers.deepseek]
format = "deepseek"
base_url = "https://api.deepseek.com"
api_key = "sk-test"

[[providers.deepseek.models]]
name = "deepseek-chat"

[[providers.deepseek.models]]
name = "deepseek-reasoner"
supports_thinking = true

[providers.greatwall]
format = "greatwall"
base_url = "https://gw.example.com"
enabled = false

[[providers.greatwall.models]]
name = "gw-large"
api_run_id = "run-42"
"#,
        )
        .unwrap();

        assert_eq!(config.defaults.provider, "deepseek");
        assert_eq!(config.defaults.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(config.defaults.max_tokens, 4096);
        assert_eq!(config.chat.max_history_turns, 4);
        assert_eq!(config.chat.response_timeout, Duration::from_secs(60));
        assert_eq!(config.chat.replay_buffer, 8);
        assert!(!config.search.enabled);
        assert_eq!(config.search.max_tool_calls, 1);

        let deepseek = &config.providers["deepseek"];
        assert_eq!(deepseek.format, WireFormat::DeepSeek);
        assert!(deepseek.enabled);
        assert_eq!(deepseek.models.len(), 2);
        assert!(deepseek.models[1].supports_thinking);
        assert_eq!(deepseek.read_timeout_ms, 30_000);

        let greatwall = &config.providers["greatwall"];
        assert!(!greatwall.enabled);
        assert_eq!(greatwall.models[0].api_run_id.as_deref(), Some("run-42"));
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_parse_empty_toml_keeps_defaults() {
        let config = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(config.defaults.provider, "qwen");
        assert_eq!(config.chat.subscriber_buffer, 256);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = RelayConfig::from_toml_str("[defaults\nprovider = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_buffer() {
        let result = RelayConfig::from_toml_str("[chat]\nsubscriber_buffer = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_names_the_provider() {
        let result = RelayConfig::from_toml_str(
            "[providers.broken]\nbase_url = \"https://x\"\nread_timeout_ms = 0\n",
        );
        match result {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("providers.broken")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[defaults]\nprovider = \"openai\"\n\n[providers.openai]\nbase_url = \"https://api.openai.com/v1\"\n"
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
        assert!(config.providers.contains_key("openai"));
        assert_eq!(
            config.config_file_path.as_deref(),
            Some(file.path())
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(config.config_file_path.is_none());
        assert!(config.providers.is_empty());
    }

    // =========================================================================
    // CLI Override Tests
    // =========================================================================

    #[test]
    fn test_cli_overrides() {
        let mut config = RelayConfig::default();
        ConfigOverrides::new()
            .with_default_provider("deepseek".into())
            .with_default_model("deepseek-chat".into())
            .with_max_history_turns(2)
            .with_search_enabled(false)
            .apply(&mut config);

        assert_eq!(config.defaults.provider, "deepseek");
        assert_eq!(config.defaults.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(config.chat.max_history_turns, 2);
        assert!(!config.search.enabled);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = RelayConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_search_key_prefers_literal() {
        let search = SearchConfig {
            api_key: Some("literal".into()),
            api_key_env: Some("RELAY_TEST_UNSET_SEARCH_KEY".into()),
            ..SearchConfig::default()
        };
        assert_eq!(search.resolve_api_key().as_deref(), Some("literal"));

        let search = SearchConfig {
            api_key: None,
            api_key_env: Some("RELAY_TEST_UNSET_SEARCH_KEY".into()),
            ..SearchConfig::default()
        };
        assert_eq!(search.resolve_api_key(), None);
    }
}
