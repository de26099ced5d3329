//! Cross-process relay.
//!
//! Committed results are published to one broker queue per stream (chat,
//! score, tournament). Every process consumes those queues and re-injects
//! what other processes published into its own hub, so local subscribers
//! cannot tell where an event came from. The relay owns no match state.

pub mod memory;
pub mod redis_pubsub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::hub::{BroadcastHub, Category, HubEvent, Topic};

pub use memory::MemoryRelay;
pub use redis_pubsub::RedisRelay;

/// Delay before the first resubscribe attempt; doubles up to the cap.
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(100);
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("broker error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("malformed relay message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("event type `{event_type}` does not belong on queue `{queue}`")]
    UnknownEvent { queue: String, event_type: String },
    #[error("consumer fell behind by {0} messages")]
    Lagged(u64),
}

impl RelayError {
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

pub type RelayStream = BoxStream<'static, Result<String, RelayError>>;

/// Transport-agnostic publish/consume over named queues.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn publish(&self, queue: &str, payload: String) -> Result<(), RelayError>;
    async fn consume(&self, queue: &str) -> Result<RelayStream, RelayError>;
}

/// Broker queues. Cricket and football share the score queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Chat,
    Score,
    Tournament,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::Chat, QueueKind::Score, QueueKind::Tournament];

    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Chat => QueueKind::Chat,
            Category::Cricket | Category::Football => QueueKind::Score,
            Category::Tournament => QueueKind::Tournament,
        }
    }

    pub fn queue_name(&self, prefix: &str) -> String {
        let suffix = match self {
            QueueKind::Chat => "chat",
            QueueKind::Score => "score",
            QueueKind::Tournament => "tournament",
        };
        format!("{prefix}.{suffix}")
    }
}

/// Resolves the hub category of an inbound message from its queue and its
/// declared type.
pub fn classify(queue: QueueKind, event_type: &str, queue_name: &str) -> Result<Category, RelayError> {
    Category::of_event(event_type)
        .filter(|c| QueueKind::for_category(*c) == queue)
        .ok_or_else(|| RelayError::UnknownEvent {
            queue: queue_name.to_string(),
            event_type: event_type.to_string(),
        })
}

/// Wire form of a relayed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// Process that published the event.
    pub origin: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub topic: Option<Topic>,
    pub payload: Value,
}

impl RelayEnvelope {
    pub fn wrap(origin: &str, event: &HubEvent) -> Self {
        Self {
            origin: origin.to_string(),
            event_type: event.event_type.clone(),
            topic: event.topic.clone(),
            payload: event.payload.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Decodes one inbound message. `Ok(None)` means the message was published
/// by this process and is already delivered locally.
pub fn decode_inbound(
    origin: &str,
    queue: QueueKind,
    queue_name: &str,
    raw: &str,
) -> Result<Option<HubEvent>, RelayError> {
    let envelope = RelayEnvelope::decode(raw)?;
    if envelope.origin == origin {
        return Ok(None);
    }
    let category = classify(queue, &envelope.event_type, queue_name)?;
    Ok(Some(HubEvent {
        category,
        event_type: envelope.event_type,
        topic: envelope.topic,
        payload: envelope.payload,
    }))
}

/// This process's connection to the relay.
#[derive(Clone)]
pub struct RelayLink {
    relay: Arc<dyn Relay>,
    origin: String,
    prefix: String,
}

impl RelayLink {
    pub fn new(relay: Arc<dyn Relay>, origin: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            relay,
            origin: origin.into(),
            prefix: prefix.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Publishes a locally committed event for other processes.
    pub async fn forward(&self, event: &HubEvent) -> Result<(), RelayError> {
        let queue = QueueKind::for_category(event.category).queue_name(&self.prefix);
        let payload = RelayEnvelope::wrap(&self.origin, event).encode()?;
        self.relay.publish(&queue, payload).await
    }

    /// Starts one consumer task per queue. Each task resubscribes when its
    /// stream ends and stops only once the hub is closed.
    pub async fn spawn_consumers(&self, hub: Arc<BroadcastHub>) -> Result<Vec<JoinHandle<()>>, RelayError> {
        let mut handles = Vec::with_capacity(QueueKind::ALL.len());
        for kind in QueueKind::ALL {
            let name = kind.queue_name(&self.prefix);
            // Subscribe before returning so nothing published afterwards is missed.
            let stream = self.relay.consume(&name).await?;
            let consumer = Consumer {
                relay: self.relay.clone(),
                hub: hub.clone(),
                origin: self.origin.clone(),
                kind,
                queue: name,
            };
            handles.push(tokio::spawn(consumer.run(stream)));
        }
        Ok(handles)
    }
}

enum ConsumerExit {
    StreamEnded,
    HubClosed,
}

struct Consumer {
    relay: Arc<dyn Relay>,
    hub: Arc<BroadcastHub>,
    origin: String,
    kind: QueueKind,
    queue: String,
}

impl Consumer {
    async fn run(self, mut stream: RelayStream) {
        tracing::info!(queue = %self.queue, "relay consumer started");
        while let ConsumerExit::StreamEnded = self.drain(stream).await {
            match self.resubscribe().await {
                Some(next) => stream = next,
                None => break,
            }
        }
        tracing::info!(queue = %self.queue, "relay consumer stopped");
    }

    async fn drain(&self, mut stream: RelayStream) -> ConsumerExit {
        while let Some(message) = stream.next().await {
            let raw = match message {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(queue = %self.queue, error = %e, "relay receive failed");
                    continue;
                }
            };
            match decode_inbound(&self.origin, self.kind, &self.queue, &raw) {
                Ok(Some(event)) => {
                    if let Err(e) = self.hub.inject(event).await {
                        tracing::info!(queue = %self.queue, error = %e, "hub closed");
                        return ConsumerExit::HubClosed;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(queue = %self.queue, error = %e, "relay message discarded");
                }
            }
        }
        ConsumerExit::StreamEnded
    }

    /// Retries with exponential backoff. `None` once the hub has closed.
    async fn resubscribe(&self) -> Option<RelayStream> {
        let mut delay = RESUBSCRIBE_BACKOFF;
        loop {
            if self.hub.is_closed() {
                return None;
            }
            tracing::warn!(queue = %self.queue, delay_ms = delay.as_millis() as u64, "relay stream ended, resubscribing");
            tokio::time::sleep(delay).await;
            if self.hub.is_closed() {
                return None;
            }
            match self.relay.consume(&self.queue).await {
                Ok(stream) => {
                    tracing::info!(queue = %self.queue, "relay consumer resubscribed");
                    return Some(stream);
                }
                Err(e) => {
                    tracing::warn!(queue = %self.queue, error = %e, "relay resubscribe failed");
                    delay = (delay * 2).min(RESUBSCRIBE_BACKOFF_MAX);
                }
            }
        }
    }
}
