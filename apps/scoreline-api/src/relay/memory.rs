//! In-process broker for tests and single-node runs. Several `RelayLink`s
//! sharing one `MemoryRelay` behave like separate processes on one broker.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{Relay, RelayError, RelayStream};

pub struct MemoryRelay {
    queues: DashMap<String, broadcast::Sender<String>>,
    buffer_size: usize,
}

impl MemoryRelay {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            queues: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Drops the queue as a lost broker connection would. Open consumer
    /// streams end; later publishes and subscriptions start a fresh queue.
    pub fn disconnect(&self, queue: &str) {
        self.queues.remove(queue);
    }

    /// Live subscriptions on `queue`.
    pub fn consumers(&self, queue: &str) -> usize {
        self.queues
            .get(queue)
            .map_or(0, |sender| sender.receiver_count())
    }

    fn sender(&self, queue: &str) -> broadcast::Sender<String> {
        self.queues
            .entry(queue.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .clone()
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn publish(&self, queue: &str, payload: String) -> Result<(), RelayError> {
        // No consumers yet is not an error; the message is simply unseen.
        let _ = self.sender(queue).send(payload);
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<RelayStream, RelayError> {
        let receiver = self.sender(queue).subscribe();
        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(message) => Some((Ok(message), receiver)),
                Err(RecvError::Lagged(n)) => Some((Err(RelayError::Lagged(n)), receiver)),
                Err(RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }
}
