//! Stream Orchestrator
//!
//! Runs one generation per request:
//!
//! ```text
//! start()  validate -> claim conversation -> save user turn -> select model
//!          -> read history -> subscribe requester -> spawn pipeline
//!
//! pipeline start -> [search] -> assemble prompt -> stream adapter
//!          -> persist reply -> end        (or error, exactly once)
//!
//! teardown (always, also on abort)
//!          cancelled error if nothing terminal went out -> close channel
//!          -> release conversation
//! ```
//!
//! Everything `start` does before spawning is synchronous from the caller's
//! point of view and fails with a [`GenerationError`]. Once the pipeline runs,
//! failures are reported to subscribers as a terminal `error` event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::accumulator::AssembledMessage;
use crate::backend::{AdapterRegistry, BackendError, Delta, LlmRequest, ProviderAdapter};
use crate::bus::{BusConfig, ConversationEventBus, GenerationGuard, Subscription};
use crate::config::{DefaultsConfig, ModelConfig, RelayConfig};
use crate::errors::{ErrorCategory, GENERIC_ERROR_MESSAGE};
use crate::events::GenerationRequest;
use crate::messages::{ChatEvent, ConversationId, MessageId};
use crate::prompt::PromptAssembler;
use crate::selector::{ModelSelection, ModelSelector, SelectionError};
use crate::store::{ConversationTurn, MessageStore, PreferenceStore, Role, StoreError};
use crate::tools::{EventSink, ToolContext, WebSearchTool};

/// Status text of the `start` event
pub const PROCESSING_MESSAGE: &str = "processing";

/// Sent when the model finished without any answer text
pub const EMPTY_RESPONSE_MESSAGE: &str = "The AI service returned an empty response";

/// Sent when a generation is torn down before it finished
pub const CANCELLED_MESSAGE: &str = "Generation was cancelled";

/// Sent when the finished reply could not be stored
pub const SAVE_FAILED_MESSAGE: &str = "The response could not be saved, please try again";

const DEFAULT_FINISH_REASON: &str = "stop";

/// Why a generation could not be started
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The message was blank
    #[error("message must not be empty")]
    EmptyMessage,

    /// Another generation is running for the conversation
    #[error("a generation is already running for conversation {0}")]
    Busy(ConversationId),

    /// No provider/model could serve the request
    #[error(transparent)]
    Configuration(#[from] SelectionError),

    /// Reading or writing conversation state failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// How a generation ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Reply persisted and `end` sent
    Completed {
        /// Id of the stored assistant message
        message_id: MessageId,
    },
    /// `error` sent with this message
    Failed {
        /// User-facing message that was sent
        message: String,
    },
    /// Task aborted before it finished
    Cancelled,
}

// ============================================================================
// Emitter
// ============================================================================

/// Ordered event output of one generation
///
/// Latches after the first terminal event; anything emitted later is dropped.
struct Emitter {
    bus: ConversationEventBus,
    conversation_id: ConversationId,
    terminated: AtomicBool,
}

impl Emitter {
    fn new(bus: ConversationEventBus, conversation_id: ConversationId) -> Self {
        Self {
            bus,
            conversation_id,
            terminated: AtomicBool::new(false),
        }
    }

    async fn send(&self, event: ChatEvent) -> bool {
        if self.terminated.load(Ordering::SeqCst) {
            tracing::debug!(event = event.event_name(), "Dropping event after terminal event");
            return false;
        }
        if event.is_terminal() && self.terminated.swap(true, Ordering::SeqCst) {
            return false;
        }

        let name = event.event_name();
        let result = self.bus.publish(self.conversation_id, event).await;
        if !result.all_succeeded() {
            tracing::debug!(
                event = name,
                delivered = result.successful,
                failed = result.failed,
                "Event not delivered to every subscriber"
            );
        }
        true
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for Emitter {
    async fn emit(&self, event: ChatEvent) {
        self.send(event).await;
    }
}

/// Runs teardown when the pipeline future finishes or is dropped
struct PipelineTeardown {
    emitter: Arc<Emitter>,
    // released after the channel is closed
    _guard: GenerationGuard,
}

impl Drop for PipelineTeardown {
    fn drop(&mut self) {
        let id = self.emitter.conversation_id;
        if !self.emitter.terminated.swap(true, Ordering::SeqCst) {
            tracing::info!(conversation_id = %id, "Generation cancelled");
            let _ = self.emitter.bus.try_publish(id, ChatEvent::error(CANCELLED_MESSAGE));
        }
        self.emitter.bus.close(id);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// A running generation
///
/// Holds the requester's subscription and the pipeline task.
pub struct GenerationHandle {
    conversation_id: ConversationId,
    subscription: Subscription,
    task: JoinHandle<GenerationOutcome>,
}

impl std::fmt::Debug for GenerationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationHandle")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

impl GenerationHandle {
    /// Conversation being answered
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// The requester's event stream
    pub fn subscription(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    /// Abort the pipeline; teardown still runs
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Stop listening and wait for the pipeline to finish
    pub async fn join(self) -> GenerationOutcome {
        let Self { subscription, task, .. } = self;
        drop(subscription);
        Self::outcome(task).await
    }

    /// Read every event until the channel closes, then wait for the pipeline
    pub async fn collect(self) -> (Vec<ChatEvent>, GenerationOutcome) {
        let Self {
            mut subscription,
            task,
            ..
        } = self;
        let mut events = Vec::new();
        while let Some(event) = subscription.next().await {
            events.push(event);
        }
        (events, Self::outcome(task).await)
    }

    async fn outcome(task: JoinHandle<GenerationOutcome>) -> GenerationOutcome {
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => GenerationOutcome::Cancelled,
            Err(e) => {
                tracing::error!(error = %e, "Generation task panicked");
                GenerationOutcome::Failed {
                    message: GENERIC_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

struct Shared {
    registry: Arc<AdapterRegistry>,
    selector: ModelSelector,
    messages: Arc<dyn MessageStore>,
    search: WebSearchTool,
    search_available: bool,
    bus: ConversationEventBus,
    prompt: PromptAssembler,
    defaults: DefaultsConfig,
    response_timeout: Duration,
}

/// Builds a [`StreamOrchestrator`]
pub struct OrchestratorBuilder {
    config: RelayConfig,
    registry: Arc<AdapterRegistry>,
    messages: Arc<dyn MessageStore>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    search: Option<WebSearchTool>,
    bus: Option<ConversationEventBus>,
}

impl OrchestratorBuilder {
    /// Look up stored model preferences for signed-in users
    #[must_use]
    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Use this search tool instead of a backend-less default
    #[must_use]
    pub fn search_tool(mut self, tool: WebSearchTool) -> Self {
        self.search = Some(tool);
        self
    }

    /// Publish on an existing bus
    #[must_use]
    pub fn bus(mut self, bus: ConversationEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> StreamOrchestrator {
        let Self {
            config,
            registry,
            messages,
            preferences,
            search,
            bus,
        } = self;

        let selector = ModelSelector::new(Arc::clone(&registry), preferences, config.defaults.clone());
        let search = search.unwrap_or_else(|| WebSearchTool::new(&config.search));
        let bus = bus.unwrap_or_else(|| ConversationEventBus::new(BusConfig::from(&config.chat)));

        StreamOrchestrator {
            inner: Arc::new(Shared {
                registry,
                selector,
                messages,
                search,
                search_available: config.search.enabled,
                bus,
                prompt: PromptAssembler::new(
                    config.chat.system_preamble.clone(),
                    config.chat.max_history_turns,
                ),
                defaults: config.defaults,
                response_timeout: config.chat.response_timeout,
            }),
        }
    }
}

/// Entry point for generations
#[derive(Clone)]
pub struct StreamOrchestrator {
    inner: Arc<Shared>,
}

impl StreamOrchestrator {
    /// Start building an orchestrator
    #[must_use]
    pub fn builder(
        config: &RelayConfig,
        registry: Arc<AdapterRegistry>,
        messages: Arc<dyn MessageStore>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: config.clone(),
            registry,
            messages,
            preferences: None,
            search: None,
            bus: None,
        }
    }

    /// The bus generations publish on
    #[must_use]
    pub fn bus(&self) -> &ConversationEventBus {
        &self.inner.bus
    }

    /// Watch a conversation without starting anything
    #[must_use]
    pub fn observe(&self, conversation_id: ConversationId) -> Subscription {
        self.inner.bus.subscribe(conversation_id)
    }

    /// Start a generation
    ///
    /// # Errors
    ///
    /// - [`GenerationError::EmptyMessage`] for a blank message
    /// - [`GenerationError::Busy`] while another generation runs for the
    ///   conversation
    /// - [`GenerationError::Persistence`] when the user turn or history cannot
    ///   be read or written
    /// - [`GenerationError::Configuration`] when no provider can serve the
    ///   request
    pub async fn start(&self, request: GenerationRequest) -> Result<GenerationHandle, GenerationError> {
        if request.message.trim().is_empty() {
            return Err(GenerationError::EmptyMessage);
        }
        let conversation_id = request.conversation_id;
        let shared = &self.inner;

        let guard = shared
            .bus
            .try_begin_generation(conversation_id)
            .ok_or(GenerationError::Busy(conversation_id))?;

        shared
            .messages
            .save_user_turn(conversation_id, &request.message)
            .await?;

        let selection = match request.user_id {
            Some(user_id) => {
                shared
                    .selector
                    .select_model_for_user(user_id, request.provider.as_deref(), request.model.as_deref())
                    .await?
            }
            None => shared
                .selector
                .select_model_for_anonymous(request.provider.as_deref(), request.model.as_deref())?,
        };
        let adapter = shared.registry.adapter(&selection.provider).ok_or_else(|| {
            SelectionError::NoProviderAvailable {
                requested_provider: Some(selection.provider.clone()),
                requested_model: Some(selection.model.clone()),
            }
        })?;
        let model_config = shared
            .registry
            .model(&selection.provider, &selection.model)
            .cloned();

        let mut history = shared.messages.history(conversation_id).await?;
        if history
            .last()
            .is_some_and(|turn| turn.role == Role::User && turn.content == request.message)
        {
            history.pop();
        }

        let subscription = shared.bus.subscribe(conversation_id);

        let span = tracing::info_span!(
            "generation",
            conversation_id = %conversation_id,
            provider = %selection.provider,
            model = %selection.model,
        );
        tracing::info!(
            parent: &span,
            search = request.search_enabled,
            deep_thinking = request.deep_thinking,
            history_turns = history.len(),
            "Generation started"
        );

        let emitter = Arc::new(Emitter::new(shared.bus.clone(), conversation_id));
        let teardown = PipelineTeardown {
            emitter: Arc::clone(&emitter),
            _guard: guard,
        };
        let pipeline = Pipeline {
            shared: Arc::clone(shared),
            request,
            selection,
            adapter,
            model_config,
            history,
        };

        let task = tokio::spawn(
            async move {
                let _teardown = teardown;
                pipeline.run(&emitter).await
            }
            .instrument(span),
        );

        Ok(GenerationHandle {
            conversation_id,
            subscription,
            task,
        })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

struct Pipeline {
    shared: Arc<Shared>,
    request: GenerationRequest,
    selection: ModelSelection,
    adapter: Arc<dyn ProviderAdapter>,
    model_config: Option<ModelConfig>,
    history: Vec<ConversationTurn>,
}

impl Pipeline {
    async fn run(self, emitter: &Emitter) -> GenerationOutcome {
        let conversation_id = self.request.conversation_id;
        emitter
            .send(ChatEvent::Start {
                message: PROCESSING_MESSAGE.to_string(),
            })
            .await;

        let search_context = if self.request.search_enabled && self.shared.search_available {
            let mut ctx = ToolContext::new(conversation_id, true);
            self.shared
                .search
                .invoke(&self.request.message, &mut ctx, emitter)
                .await
                .context()
        } else {
            None
        };

        let prompt = self
            .shared
            .prompt
            .assemble(&self.history, &self.request.message, search_context.as_deref());
        let llm_request = self.build_request(prompt);

        let timeout = self.shared.response_timeout;
        let streamed = match tokio::time::timeout(timeout, self.stream(&llm_request, emitter)).await {
            Ok(streamed) => streamed,
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Generation exceeded response timeout");
                Err(BackendError::Timeout(timeout))
            }
        };

        let (message, finish_reason) = match streamed {
            Ok(done) => done,
            Err(error) => {
                let category = ErrorCategory::classify(&error);
                if category.is_transient() {
                    tracing::warn!(error = %error, %category, "Generation failed on a transient upstream error");
                } else {
                    tracing::error!(error = %error, %category, "Generation failed");
                }
                return Self::fail(emitter, category.user_message()).await;
            }
        };

        let reply = message.finalize();
        if reply.content.is_empty() {
            tracing::warn!("Upstream finished without answer text");
            return Self::fail(emitter, EMPTY_RESPONSE_MESSAGE).await;
        }

        match self
            .shared
            .messages
            .save_assistant_turn(conversation_id, &reply.content, reply.thinking.as_deref())
            .await
        {
            Ok(message_id) => {
                emitter
                    .send(ChatEvent::End {
                        message_id: Some(message_id),
                        finish_reason,
                    })
                    .await;
                tracing::info!(message_id = %message_id, "Generation completed");
                GenerationOutcome::Completed { message_id }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist assistant reply");
                Self::fail(emitter, SAVE_FAILED_MESSAGE).await
            }
        }
    }

    fn build_request(&self, prompt: String) -> LlmRequest {
        let defaults = &self.shared.defaults;
        let model = self.model_config.as_ref();

        let mut request = LlmRequest::new(prompt, &self.selection.model)
            .with_temperature(model.and_then(|m| m.temperature).unwrap_or(defaults.temperature))
            .with_max_tokens(model.and_then(|m| m.max_tokens).unwrap_or(defaults.max_tokens));

        if self.request.deep_thinking {
            if model.is_some_and(|m| m.supports_thinking) {
                request = request.with_thinking(Some(defaults.thinking_budget));
            } else {
                tracing::debug!("Deep thinking requested but the model does not support it");
            }
        }
        request
    }

    /// Forward deltas while accumulating the reply
    async fn stream(
        &self,
        request: &LlmRequest,
        emitter: &Emitter,
    ) -> Result<(AssembledMessage, String), BackendError> {
        let mut deltas = self.adapter.stream(request);
        let mut message = AssembledMessage::new();

        while let Some(delta) = deltas.next().await {
            match delta {
                Delta::Thinking(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    message.push_thinking(&text);
                    emitter.send(ChatEvent::thinking(text)).await;
                }
                Delta::Chunk(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    message.push_chunk(&text);
                    emitter.send(ChatEvent::chunk(text)).await;
                }
                Delta::End { finish_reason } => return Ok((message, finish_reason)),
                Delta::Error(error) => return Err(error),
            }
        }

        Ok((message, DEFAULT_FINISH_REASON.to_string()))
    }

    async fn fail(emitter: &Emitter, message: &str) -> GenerationOutcome {
        emitter.send(ChatEvent::error(message)).await;
        GenerationOutcome::Failed {
            message: message.to_string(),
        }
    }
}
