//! Conversation Event Bus
//!
//! Fans generation events out to every client watching a conversation.
//!
//! # Architecture
//!
//! ```text
//!                      ConversationEventBus
//!        ┌─────────────────────────────────────────────────┐
//!        │ DashMap<ConversationId, Arc<ConversationChannel>>│
//!        │ DashSet<ConversationId>  (generation in flight) │
//!        └──────────────────────┬──────────────────────────┘
//!                               │ publish (ordered, awaited)
//!              ┌────────────────┼────────────────┐
//!              │                │                │
//!       ┌──────▼──────┐  ┌──────▼──────┐  ┌──────▼──────┐
//!       │ Subscription│  │ Subscription│  │ Subscription│
//!       │   sub-1     │  │   sub-2     │  │   sub-3     │
//!       └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! # Delivery
//!
//! Each subscriber owns a bounded queue. `publish` awaits every queue in turn,
//! so all subscribers see the same order. A queue that stays full past the
//! send timeout is evicted: its stream ends after what it already holds, it
//! never skips an event.
//!
//! # Thread Safety
//!
//! Subscriber maps are `parking_lot` locks and are never held across an
//! `.await`; senders are snapshotted before delivery.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use futures::Stream;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::config::ChatConfig;
use crate::messages::{ChatEvent, ConversationId};

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of a publish operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Subscribers that accepted the event
    pub successful: usize,
    /// Subscribers that did not
    pub failed: usize,
    /// IDs of subscribers that did not
    pub failed_ids: Vec<SubscriberId>,
}

impl BroadcastResult {
    /// Check if all subscribers received the event
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Check if nobody received the event
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.successful == 0
    }
}

/// Delivery settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Per-subscriber queue capacity
    pub subscriber_buffer: usize,
    /// How long a full queue may hold up delivery before eviction
    pub send_timeout: Duration,
    /// Recent events replayed to new subscribers (0 disables)
    pub replay_buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for BusConfig {
    fn from(chat: &ChatConfig) -> Self {
        Self {
            subscriber_buffer: chat.subscriber_buffer.max(1),
            send_timeout: chat.subscriber_send_timeout,
            replay_buffer: chat.replay_buffer,
        }
    }
}

struct ConversationChannel {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<ChatEvent>>>,
    replay: Mutex<VecDeque<ChatEvent>>,
    closed: AtomicBool,
}

impl ConversationChannel {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            replay: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn remove(&self, id: SubscriberId) {
        self.subscribers.write().remove(&id);
    }
}

struct BusInner {
    channels: DashMap<ConversationId, Arc<ConversationChannel>>,
    in_flight: DashSet<ConversationId>,
    config: BusConfig,
}

impl BusInner {
    /// Drop the channel when nobody listens and nothing is generating
    fn remove_if_idle(&self, id: ConversationId) {
        if self.in_flight.contains(&id) {
            return;
        }
        let removed = self.channels.remove_if(&id, |_, channel| {
            let subscribers = channel.subscribers.read();
            if subscribers.is_empty() {
                channel.closed.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        });
        if removed.is_some() {
            tracing::debug!(conversation_id = %id, "Idle conversation channel removed");
        }
    }
}

/// Per-conversation fan-out of [`ChatEvent`]s
#[derive(Clone)]
pub struct ConversationEventBus {
    inner: Arc<BusInner>,
}

impl Default for ConversationEventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl ConversationEventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                in_flight: DashSet::new(),
                config,
            }),
        }
    }

    /// Delivery settings
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    fn channel(&self, id: ConversationId) -> Arc<ConversationChannel> {
        let entry = self
            .inner
            .channels
            .entry(id)
            .or_insert_with(|| Arc::new(ConversationChannel::new()));
        Arc::clone(entry.value())
    }

    fn existing_channel(&self, id: ConversationId) -> Option<Arc<ConversationChannel>> {
        self.inner.channels.get(&id).map(|c| Arc::clone(c.value()))
    }

    /// Register a subscriber for a conversation
    ///
    /// The subscriber sees every event published from now on, preceded by the
    /// replay buffer when one is configured.
    pub fn subscribe(&self, conversation_id: ConversationId) -> Subscription {
        let id = SubscriberId::next();
        loop {
            let channel = self.channel(conversation_id);
            let (tx, rx) = mpsc::channel(self.inner.config.subscriber_buffer.max(1));
            {
                let mut subscribers = channel.subscribers.write();
                if channel.closed.load(Ordering::SeqCst) {
                    // raced with close or idle removal; the map now holds a fresh channel
                    continue;
                }
                for event in channel.replay.lock().iter() {
                    if tx.try_send(event.clone()).is_err() {
                        break;
                    }
                }
                subscribers.insert(id, tx);
            }

            tracing::debug!(
                conversation_id = %conversation_id,
                subscriber_id = %id,
                "Subscriber registered"
            );
            return Subscription {
                id,
                conversation_id,
                rx,
                channel,
                bus: Arc::clone(&self.inner),
            };
        }
    }

    fn publish_target(&self, id: ConversationId) -> Option<Arc<ConversationChannel>> {
        if self.inner.in_flight.contains(&id) {
            Some(self.channel(id))
        } else {
            self.existing_channel(id)
        }
    }

    /// Snapshot senders and record the event for replay
    fn prepare(&self, channel: &ConversationChannel, event: &ChatEvent) -> Vec<(SubscriberId, mpsc::Sender<ChatEvent>)> {
        let subscribers = channel.subscribers.read();
        let capacity = self.inner.config.replay_buffer;
        if capacity > 0 {
            let mut replay = channel.replay.lock();
            if replay.len() == capacity {
                replay.pop_front();
            }
            replay.push_back(event.clone());
        }
        subscribers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
    }

    /// Deliver an event to every current subscriber, in order
    ///
    /// Waits up to the send timeout for each full queue. Closed subscribers
    /// are removed and slow ones evicted.
    pub async fn publish(&self, conversation_id: ConversationId, event: ChatEvent) -> BroadcastResult {
        let Some(channel) = self.publish_target(conversation_id) else {
            return BroadcastResult::default();
        };
        let senders = self.prepare(&channel, &event);
        let timeout = self.inner.config.send_timeout;

        let mut result = BroadcastResult::default();
        for (id, tx) in senders {
            match tx.send_timeout(event.clone(), timeout).await {
                Ok(()) => result.successful += 1,
                Err(SendTimeoutError::Closed(_)) => {
                    channel.remove(id);
                    result.failed += 1;
                    result.failed_ids.push(id);
                }
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        subscriber_id = %id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Evicting subscriber that stopped reading"
                    );
                    channel.remove(id);
                    result.failed += 1;
                    result.failed_ids.push(id);
                }
            }
        }
        result
    }

    /// Deliver an event without waiting
    ///
    /// Full queues are skipped, not evicted.
    pub fn try_publish(&self, conversation_id: ConversationId, event: ChatEvent) -> BroadcastResult {
        let Some(channel) = self.existing_channel(conversation_id) else {
            return BroadcastResult::default();
        };
        let senders = self.prepare(&channel, &event);

        let mut result = BroadcastResult::default();
        for (id, tx) in senders {
            match tx.try_send(event.clone()) {
                Ok(()) => result.successful += 1,
                Err(TrySendError::Closed(_)) => {
                    channel.remove(id);
                    result.failed += 1;
                    result.failed_ids.push(id);
                }
                Err(TrySendError::Full(_)) => {
                    result.failed += 1;
                    result.failed_ids.push(id);
                }
            }
        }
        result
    }

    /// Close a conversation channel
    ///
    /// Subscribers drain what is already queued and then end. A later
    /// `subscribe` starts a fresh channel.
    pub fn close(&self, conversation_id: ConversationId) {
        if let Some((_, channel)) = self.inner.channels.remove(&conversation_id) {
            channel.closed.store(true, Ordering::SeqCst);
            let dropped = {
                let mut subscribers = channel.subscribers.write();
                let n = subscribers.len();
                subscribers.clear();
                n
            };
            tracing::debug!(
                conversation_id = %conversation_id,
                subscribers = dropped,
                "Conversation channel closed"
            );
        }
    }

    /// Claim the conversation for one generation
    ///
    /// Returns `None` when a generation is already running.
    #[must_use]
    pub fn try_begin_generation(&self, conversation_id: ConversationId) -> Option<GenerationGuard> {
        if self.inner.in_flight.insert(conversation_id) {
            Some(GenerationGuard {
                conversation_id,
                bus: Arc::clone(&self.inner),
            })
        } else {
            None
        }
    }

    /// Whether a generation is running for the conversation
    #[must_use]
    pub fn is_generating(&self, conversation_id: ConversationId) -> bool {
        self.inner.in_flight.contains(&conversation_id)
    }

    /// Current subscriber count for a conversation
    #[must_use]
    pub fn subscriber_count(&self, conversation_id: ConversationId) -> usize {
        self.existing_channel(conversation_id)
            .map_or(0, |c| c.subscribers.read().len())
    }

    /// Number of live conversation channels
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }
}

/// Exclusive claim on a conversation; released on drop
pub struct GenerationGuard {
    conversation_id: ConversationId,
    bus: Arc<BusInner>,
}

impl GenerationGuard {
    /// Conversation this guard holds
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }
}

impl fmt::Debug for GenerationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationGuard")
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.bus.in_flight.remove(&self.conversation_id);
        self.bus.remove_if_idle(self.conversation_id);
    }
}

/// One client's view of a conversation
///
/// Dropping it deregisters the client without affecting anyone else.
pub struct Subscription {
    id: SubscriberId,
    conversation_id: ConversationId,
    rx: mpsc::Receiver<ChatEvent>,
    channel: Arc<ConversationChannel>,
    bus: Arc<BusInner>,
}

impl Subscription {
    /// Subscriber id
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Conversation being watched
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Next event, `None` once the channel closed or this subscriber was evicted
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.rx.recv().await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

impl Stream for Subscription {
    type Item = ChatEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.remove(self.id);
        tracing::debug!(
            conversation_id = %self.conversation_id,
            subscriber_id = %self.id,
            "Subscriber deregistered"
        );
        self.bus.remove_if_idle(self.conversation_id);
    }
}
