//! Redis pub/sub relay for multi-process deployments.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{Relay, RelayError, RelayStream};

/// Publishes over a shared `ConnectionManager`; each consumer gets its own
/// pub/sub connection.
#[derive(Clone)]
pub struct RedisRelay {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisRelay {
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(url).map_err(RelayError::transport)?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(RelayError::transport)?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Relay for RedisRelay {
    async fn publish(&self, queue: &str, payload: String) -> Result<(), RelayError> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(queue, payload)
            .await
            .map_err(RelayError::transport)?;
        tracing::trace!(queue = %queue, receivers, "relay message published");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<RelayStream, RelayError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(RelayError::transport)?;
        pubsub.subscribe(queue).await.map_err(RelayError::transport)?;
        // Ends when the connection drops; the consumer then resubscribes.
        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload::<String>().map_err(RelayError::transport));
        Ok(stream.boxed())
    }
}
