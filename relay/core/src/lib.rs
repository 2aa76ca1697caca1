//! Relay Core - Multi-Provider Streaming Chat for relay
//!
//! This crate turns one user message into a live stream of events for every
//! client watching the conversation. It talks to several LLM providers with
//! different streaming wire formats, optionally runs a web search first, and
//! persists the finished reply.
//!
//! # Architecture
//!
//! ```text
//!  GenerationRequest
//!        │
//! ┌──────▼───────────────────────────────────────────────────────────┐
//! │                      StreamOrchestrator                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │ ModelSelector│  │ WebSearchTool│  │    PromptAssembler     │  │
//! │  └──────┬───────┘  └──────┬───────┘  └───────────┬────────────┘  │
//! │         │                 │                      │               │
//! │  ┌──────▼─────────────────▼──────────────────────▼────────────┐  │
//! │  │          AdapterRegistry → ProviderAdapter                  │  │
//! │  │   OpenAI SSE  │  DeepSeek reasoning  │  GreatWall events    │  │
//! │  └──────────────────────────┬──────────────────────────────────┘  │
//! └─────────────────────────────┼────────────────────────────────────┘
//!                               │ ChatEvent
//!                  ┌────────────▼────────────┐
//!                  │  ConversationEventBus   │
//!                  └──┬─────────┬─────────┬──┘
//!                     │         │         │
//!                  client    client    client
//! ```
//!
//! # Key Types
//!
//! - [`StreamOrchestrator`]: runs one generation per request
//! - [`ProviderAdapter`]: upstream provider behind a canonical [`Delta`] stream
//! - [`ModelSelector`]: request, then user preference, then system default
//! - [`WebSearchTool`]: optional search step with citation events
//! - [`ConversationEventBus`]: ordered per-conversation fan-out
//! - [`ChatEvent`]: what clients receive, encodable as SSE frames
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use relay_core::{
//!     AdapterRegistry, ConversationId, GenerationRequest, InMemoryStore, StreamOrchestrator,
//!     config::load_config,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let registry = Arc::new(AdapterRegistry::from_config(&config));
//!     let store = Arc::new(InMemoryStore::new());
//!     let orchestrator = StreamOrchestrator::builder(&config, registry, store).build();
//!
//!     let mut handle = orchestrator
//!         .start(GenerationRequest::new(ConversationId(1), "Hello"))
//!         .await?;
//!     while let Some(event) = handle.subscription().recv().await {
//!         print!("{}", event.to_sse_frame()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: provider adapters, wire decoders, retry, registry
//! - [`bus`]: conversation event fan-out
//! - [`config`]: TOML/env configuration
//! - [`errors`]: upstream error classification and user-facing messages
//! - [`events`]: inbound generation requests
//! - [`messages`]: outbound chat events and shared ids
//! - [`orchestrator`]: the generation pipeline
//! - [`prompt`]: prompt assembly
//! - [`selector`]: provider/model selection
//! - [`store`]: persistence traits and an in-memory store
//! - [`tools`]: web search
//! - [`accumulator`]: reply accumulation and think-block extraction

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accumulator;
pub mod backend;
pub mod bus;
pub mod config;
pub mod errors;
pub mod events;
pub mod messages;
pub mod orchestrator;
pub mod prompt;
pub mod selector;
pub mod store;
pub mod tools;

// Re-exports for convenience
pub use accumulator::{AssembledMessage, FinalMessage};
pub use backend::{
    AdapterRegistry, BackendError, Delta, DeltaStream, HttpProviderAdapter, LlmRequest,
    ProviderAdapter, RetryConfig, ScriptedAdapter, WireFormat,
};
pub use bus::{BroadcastResult, BusConfig, ConversationEventBus, GenerationGuard, Subscription};
pub use config::{ConfigError, ConfigOverrides, ModelConfig, ProviderConfig, RelayConfig};
pub use errors::{ErrorCategory, GENERIC_ERROR_MESSAGE};
pub use events::GenerationRequest;
pub use messages::{ChatEvent, ConversationId, MessageId, SearchResult, UserId};
pub use orchestrator::{
    GenerationError, GenerationHandle, GenerationOutcome, OrchestratorBuilder, StreamOrchestrator,
};
pub use prompt::PromptAssembler;
pub use selector::{ModelSelection, ModelSelector, SelectionError};
pub use store::{
    ConversationTurn, InMemoryStore, MessageStore, PreferenceStore, Role, StoreError, ToolCallStore,
};
pub use tools::{SearchBackend, SearchError, StaticSearchBackend, TavilySearchBackend, WebSearchTool};
