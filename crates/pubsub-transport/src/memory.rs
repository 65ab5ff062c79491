//! In-process transport.
//!
//! Delivers every publish to all live subscribers of the topic and keeps a
//! log of everything published. Publishes and subscribes can be made to
//! fail for transport-failure tests.

use crate::error::{TransportError, TransportResult};
use crate::{Subscription, Transport, SUBSCRIPTION_BUFFER};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// A payload recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    published: Mutex<Vec<PublishedMessage>>,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent subscribes fail (or succeed again).
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// All successfully published messages, in publish order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Published payloads for one topic.
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscriber; pending `recv` calls return `None`.
    pub fn close(&self) {
        self.subscribers.lock().clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> TransportResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        let senders = {
            let mut subscribers = self.subscribers.lock();
            match subscribers.get_mut(topic) {
                Some(subs) => {
                    subs.retain(|tx| !tx.is_closed());
                    subs.clone()
                }
                None => Vec::new(),
            }
        };

        debug!(topic, receivers = senders.len(), "Published message");
        for tx in senders {
            let _ = tx.send(payload.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}
