//! The process-wide broadcast hub.
//!
//! One bounded intake queue and one delivery task per [`Category`]. Each task
//! is the only reader of its queue, so events of a category go out in the
//! order they were enqueued.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::client::Deliverable;
use super::event::{Category, HubEvent, Topic};
use super::policy::{Backpressure, CategoryPolicy, Fanout, HubConfig};
use super::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("broadcast hub is shut down")]
    Closed,
    #[error("client {0} is not connected")]
    UnknownClient(String),
}

/// What happened to a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Queued,
    /// The category's queue was full and its policy is to drop.
    Dropped,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CategoryMetrics {
        CategoryMetrics {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryMetrics {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    /// Client writes that failed and got the client removed.
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubMetrics {
    pub clients: usize,
    pub topics: usize,
    pub categories: BTreeMap<&'static str, CategoryMetrics>,
}

struct Intake {
    sender: mpsc::Sender<HubEvent>,
    policy: CategoryPolicy,
    counters: Arc<Counters>,
}

pub struct BroadcastHub {
    registry: Arc<Registry>,
    /// Indexed by [`Category::index`].
    intakes: Vec<Intake>,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    loops: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    client_send_buffer: usize,
}

impl BroadcastHub {
    /// Builds the hub and spawns its delivery tasks. Must be called inside a
    /// Tokio runtime.
    pub fn start(config: HubConfig) -> Arc<Self> {
        let registry = Arc::new(Registry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut intakes = Vec::with_capacity(Category::ALL.len());
        let mut loops = Vec::with_capacity(Category::ALL.len());

        for category in Category::ALL {
            let policy = config.policy(category);
            let (sender, receiver) = mpsc::channel(policy.capacity.max(1));
            let counters = Arc::new(Counters::default());
            loops.push(tokio::spawn(delivery_loop(
                category,
                policy.fanout,
                receiver,
                registry.clone(),
                counters.clone(),
                shutdown_rx.clone(),
            )));
            intakes.push(Intake {
                sender,
                policy,
                counters,
            });
        }

        tracing::info!(categories = intakes.len(), "broadcast hub started");

        Arc::new(Self {
            registry,
            intakes,
            closed: AtomicBool::new(false),
            shutdown_tx,
            loops: parking_lot::Mutex::new(loops),
            client_send_buffer: config.client_send_buffer,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn client_send_buffer(&self) -> usize {
        self.client_send_buffer
    }

    pub fn register(&self, client: Arc<dyn Deliverable>) {
        let client_id = client.id().to_string();
        if let Some(previous) = self.registry.insert(client) {
            previous.close();
        }
        tracing::debug!(client_id = %client_id, "client registered");
    }

    pub fn subscribe(&self, client_id: &str, topic: Topic) -> Result<(), HubError> {
        if self.registry.subscribe(client_id, topic) {
            Ok(())
        } else {
            Err(HubError::UnknownClient(client_id.to_string()))
        }
    }

    pub fn unsubscribe(&self, client_id: &str, topic: &Topic) -> bool {
        self.registry.unsubscribe(client_id, topic)
    }

    /// Detaches the client from every topic and closes it.
    pub fn remove(&self, client_id: &str) {
        if let Some(client) = self.registry.remove(client_id) {
            client.close();
            tracing::debug!(client_id = %client_id, "client removed");
        }
    }

    pub fn is_subscribed(&self, client_id: &str, topic: &Topic) -> bool {
        self.registry.is_subscribed(client_id, topic)
    }

    /// Enqueues a locally produced event, applying the category's
    /// backpressure policy.
    pub async fn publish(&self, event: HubEvent) -> Result<Published, HubError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HubError::Closed);
        }
        let category = event.category;
        let intake = &self.intakes[category.index()];

        match intake.policy.backpressure {
            Backpressure::Block => {
                intake
                    .sender
                    .send(event)
                    .await
                    .map_err(|_| HubError::Closed)?;
            }
            Backpressure::Drop => match intake.sender.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    intake.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        category = %category,
                        event_type = %event.event_type,
                        capacity = intake.policy.capacity,
                        "intake queue full, event dropped"
                    );
                    return Ok(Published::Dropped);
                }
                Err(TrySendError::Closed(_)) => return Err(HubError::Closed),
            },
        }

        intake.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(Published::Queued)
    }

    /// Enqueues an event that arrived through the relay. Delivery is the
    /// same as for local events.
    pub async fn inject(&self, event: HubEvent) -> Result<Published, HubError> {
        tracing::trace!(category = %event.category, event_type = %event.event_type, "relayed event");
        self.publish(event).await
    }

    pub fn metrics(&self) -> HubMetrics {
        HubMetrics {
            clients: self.registry.len(),
            topics: self.registry.topic_count(),
            categories: Category::ALL
                .into_iter()
                .map(|c| (c.as_str(), self.intakes[c.index()].counters.snapshot()))
                .collect(),
        }
    }

    /// Stops intake, lets every delivery task drain what is already queued,
    /// then closes all clients. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        let loops = std::mem::take(&mut *self.loops.lock());
        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!(?e, "delivery task failed");
            }
        }
        let clients = self.registry.drain();
        let count = clients.len();
        for client in clients {
            client.close();
        }
        tracing::info!(clients = count, "broadcast hub stopped");
    }
}

async fn delivery_loop(
    category: Category,
    fanout: Fanout,
    mut receiver: mpsc::Receiver<HubEvent>,
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            event = receiver.recv() => match event {
                Some(event) => deliver(category, fanout, &registry, &counters, &event),
                None => break,
            },
            _ = shutdown.changed() => {
                receiver.close();
                let mut drained = 0usize;
                while let Some(event) = receiver.recv().await {
                    deliver(category, fanout, &registry, &counters, &event);
                    drained += 1;
                }
                tracing::debug!(category = %category, drained, "delivery queue drained");
                break;
            }
        }
    }
}

/// One pass over the target set. Failed clients are collected during the
/// pass and removed afterwards, so the registry is never mutated mid-pass.
fn deliver(
    category: Category,
    fanout: Fanout,
    registry: &Registry,
    counters: &Counters,
    event: &HubEvent,
) {
    let targets = match (fanout, &event.topic) {
        (Fanout::All, _) => registry.all(),
        (Fanout::Topic, Some(topic)) => registry.subscribers(topic),
        (Fanout::Topic, None) => {
            tracing::warn!(
                category = %category,
                event_type = %event.event_type,
                "topic event without a topic, discarded"
            );
            return;
        }
    };
    if targets.is_empty() {
        return;
    }

    let frame: Arc<str> = Arc::from(event.to_frame());
    let mut failed = Vec::new();
    for client in &targets {
        match client.try_deliver(&frame) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    category = %category,
                    client_id = %client.id(),
                    error = %e,
                    "delivery failed"
                );
                failed.push(client.id().to_string());
            }
        }
    }

    if failed.is_empty() {
        return;
    }
    for client in registry.remove_many(&failed) {
        client.close();
        tracing::debug!(
            category = %category,
            client_id = %client.id(),
            "client removed after failed delivery"
        );
    }
}
