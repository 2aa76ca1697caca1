//! Relay CLI - drive the streaming chat core from a terminal
//!
//! Sends one message through the configured providers and prints every
//! conversation event as an SSE frame on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Ask the default provider
//! relay chat "What is a monad?"
//!
//! # Pick a provider/model, enable web search and deep thinking
//! relay chat --provider deepseek --model deepseek-reasoner --search --deep-thinking "Why is the sky blue?"
//!
//! # Custom config file
//! relay --config ~/.config/relay/config.toml chat "hello"
//!
//! # List providers and probe their endpoints
//! relay providers --check
//!
//! # Verbose logging
//! RELAY_LOG=debug relay chat "hello"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relay_core::config::{default_config_path, load_config_from_path};
use relay_core::{
    AdapterRegistry, ConfigOverrides, ConversationId, GenerationOutcome, GenerationRequest,
    InMemoryStore, RelayConfig, StreamOrchestrator, TavilySearchBackend, UserId, WebSearchTool,
};

/// Relay - multi-provider streaming chat
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "RELAY_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and stream the reply as SSE frames
    Chat {
        /// The user message
        message: String,

        /// Conversation to append to
        #[arg(long, default_value_t = 1)]
        conversation: i64,

        /// Provider override for this request
        #[arg(short = 'p', long)]
        provider: Option<String>,

        /// Model override for this request
        #[arg(short = 'm', long)]
        model: Option<String>,

        /// Requesting user (enables stored preferences)
        #[arg(short = 'u', long)]
        user: Option<i64>,

        /// Run a web search before answering
        #[arg(short = 's', long)]
        search: bool,

        /// Ask for a reasoning trace when the model supports it
        #[arg(long)]
        deep_thinking: bool,
    },

    /// List configured providers
    Providers {
        /// Probe each provider endpoint
        #[arg(long)]
        check: bool,
    },
}

impl Command {
    fn overrides(&self) -> ConfigOverrides {
        match self {
            Command::Chat { search: true, .. } => ConfigOverrides::new().with_search_enabled(true),
            _ => ConfigOverrides::new(),
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("RELAY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive("relay=info".parse()?)
        .add_directive("relay_core=info".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load(args: &Args) -> Result<RelayConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;
    args.command.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn search_tool(config: &RelayConfig) -> WebSearchTool {
    let tool = WebSearchTool::new(&config.search);
    if !config.search.enabled {
        return tool;
    }
    match TavilySearchBackend::from_config(&config.search) {
        Ok(backend) => tool.with_backend(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "Web search enabled without a usable backend");
            tool
        }
    }
}

async fn chat(config: &RelayConfig, request: GenerationRequest) -> Result<bool> {
    let registry = Arc::new(AdapterRegistry::from_config(config));
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = StreamOrchestrator::builder(config, registry, store.clone())
        .preferences(store)
        .search_tool(search_tool(config))
        .build();

    let mut handle = orchestrator.start(request).await?;
    let mut stdout = tokio::io::stdout();
    while let Some(event) = handle.subscription().next().await {
        stdout.write_all(event.to_sse_frame()?.as_bytes()).await?;
        stdout.flush().await?;
        if event.is_terminal() {
            break;
        }
    }

    match handle.join().await {
        GenerationOutcome::Completed { message_id } => {
            info!(%message_id, "Reply stored");
            Ok(true)
        }
        GenerationOutcome::Failed { message } => {
            error!(%message, "Generation failed");
            Ok(false)
        }
        GenerationOutcome::Cancelled => {
            warn!("Generation cancelled");
            Ok(false)
        }
    }
}

async fn providers(config: &RelayConfig, check: bool) -> Result<()> {
    let registry = AdapterRegistry::from_config(config);
    if registry.is_empty() {
        println!("No providers configured");
        return Ok(());
    }

    for name in registry.provider_names() {
        let default_marker = if name == config.defaults.provider { " (default)" } else { "" };
        let models = config
            .providers
            .get(&name)
            .map(|p| p.models.iter().filter(|m| m.enabled).map(|m| m.name.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();

        let status = match registry.adapter(&name) {
            Some(adapter) if check => {
                if adapter.health_check().await {
                    " [ok]"
                } else {
                    " [unreachable]"
                }
            }
            _ => "",
        };
        println!("{name}{default_marker}{status}: {}", models.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let config = load(&args)?;
    info!(
        source = ?config.source(),
        providers = config.providers.len(),
        "Configuration loaded"
    );

    match args.command {
        Command::Chat {
            message,
            conversation,
            provider,
            model,
            user,
            search,
            deep_thinking,
        } => {
            let mut request = GenerationRequest::new(ConversationId(conversation), message)
                .with_search(search)
                .with_deep_thinking(deep_thinking);
            if let Some(provider) = provider {
                request = request.with_provider(provider);
            }
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(user) = user {
                request = request.with_user(UserId(user));
            }

            if !chat(&config, request).await? {
                std::process::exit(1);
            }
        }
        Command::Providers { check } => providers(&config, check).await?,
    }

    Ok(())
}
