//! The capability the hub needs from a connected client.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("client send queue is full")]
    Full,
    #[error("client is closed")]
    Closed,
}

/// A client the hub can write frames to.
///
/// `try_deliver` must never wait. `close` may be called more than once; only
/// the first call has an effect.
pub trait Deliverable: Send + Sync {
    fn id(&self) -> &str;
    fn try_deliver(&self, frame: &Arc<str>) -> Result<(), DeliveryError>;
    fn close(&self);
}

/// A socket client backed by a bounded outbound queue. The socket writer
/// task owns the receiving end and ends when the queue is closed.
pub struct ClientHandle {
    id: String,
    user_id: String,
    sender: Mutex<Option<mpsc::Sender<Arc<str>>>>,
}

impl ClientHandle {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = Arc::new(Self {
            id: id.into(),
            user_id: user_id.into(),
            sender: Mutex::new(Some(tx)),
        });
        (handle, rx)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Deliverable for ClientHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn try_deliver(&self, frame: &Arc<str>) -> Result<(), DeliveryError> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(DeliveryError::Closed)?;
        sender.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!(client_id = %self.id, "client queue closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_the_receiver() {
        let (client, mut rx) = ClientHandle::new("cli_1", "usr_1", 4);
        client.try_deliver(&Arc::from("one")).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(client.user_id(), "usr_1");
    }

    #[test]
    fn full_queue_reports_full() {
        let (client, _rx) = ClientHandle::new("cli_1", "usr_1", 1);
        client.try_deliver(&Arc::from("a")).unwrap();
        assert_eq!(client.try_deliver(&Arc::from("b")), Err(DeliveryError::Full));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_the_stream() {
        let (client, mut rx) = ClientHandle::new("cli_1", "usr_1", 4);
        client.try_deliver(&Arc::from("last")).unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(client.try_deliver(&Arc::from("x")), Err(DeliveryError::Closed));
        // Queued frames are still drained before the stream ends.
        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (client, rx) = ClientHandle::new("cli_1", "usr_1", 4);
        drop(rx);
        assert_eq!(client.try_deliver(&Arc::from("x")), Err(DeliveryError::Closed));
    }
}
