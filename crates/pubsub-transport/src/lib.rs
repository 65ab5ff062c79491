//! Publish/subscribe transport between devices and the cloud side of the loop.
//!
//! Two logical topics per building:
//!
//! - `telemetry/<building>`: devices publish monitoring events, the fan-out
//!   worker subscribes
//! - `remediation/<building>`: the change processor publishes commands,
//!   devices subscribe
//!
//! Payloads are opaque bytes here; encoding lives in `telemetry-types`.

mod error;
mod memory;
mod redis_transport;
mod topics;

pub use error::{TransportError, TransportResult};
pub use memory::{MemoryTransport, PublishedMessage};
pub use redis_transport::{redact_endpoint, RedisTransport};
pub use topics::Topics;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capacity of the per-subscription delivery buffer.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// A topic-based publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish one payload to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()>;

    /// Subscribe to `topic`.
    ///
    /// Errors here mean the subscription could not be established at all.
    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription>;
}

/// Stream of payloads delivered on one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    pub(crate) fn new(topic: impl Into<String>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload. `None` once the transport side closes.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}
