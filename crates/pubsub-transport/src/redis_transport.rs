//! Redis pub/sub transport.
//!
//! Publishing goes through one shared multiplexed connection. Each
//! subscription gets its own pub/sub connection whose messages are forwarded
//! into a bounded channel by a background task.

use crate::error::TransportResult;
use crate::{Subscription, Transport, SUBSCRIPTION_BUFFER};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Transport backed by Redis PUBLISH/SUBSCRIBE.
#[derive(Clone)]
pub struct RedisTransport {
    client: Client,
    conn: MultiplexedConnection,
}

impl RedisTransport {
    /// Connect to Redis. The connection is reused for every publish.
    pub async fn connect(url: &str) -> TransportResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %redact_endpoint(url), "Connected to pub/sub transport");
        Ok(Self { client, conn })
    }
}

impl std::fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(topic, payload).await?;
        debug!(topic, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;
        info!(topic, "Subscribed to topic");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let owned_topic = topic.to_string();

        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload = msg.get_payload_bytes().to_vec();
                if tx.send(payload).await.is_err() {
                    debug!(topic = %owned_topic, "Subscriber dropped, stopping forwarder");
                    return;
                }
            }
            warn!(topic = %owned_topic, "Pub/sub connection closed");
        });

        Ok(Subscription::new(topic, rx))
    }
}

/// Hide credentials and most of the host when logging an endpoint.
///
/// Only the last six characters survive; shorter values are fully masked.
pub fn redact_endpoint(url: &str) -> String {
    let chars: Vec<char> = url.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 6..].iter().collect();
    format!("{}{}", "*".repeat(10), visible)
}
