//! Subscription-driven ingestion: decode, dispatch, repeat.

use crate::dispatcher::Dispatcher;
use crate::error::WorkerResult;
use pubsub_transport::{Subscription, TransportError};
use telemetry_types::decode_event;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct IngestLoop {
    dispatcher: Dispatcher,
    processed: u64,
    skipped: u64,
}

impl IngestLoop {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            processed: 0,
            skipped: 0,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Events dispatched so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Payloads that failed to decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Consume `subscription` until `cancel` fires.
    ///
    /// A subscription that closes underneath the loop is an error: no more
    /// telemetry can arrive.
    pub async fn run(
        &mut self,
        mut subscription: Subscription,
        cancel: CancellationToken,
    ) -> WorkerResult<()> {
        info!(topic = subscription.topic(), "Ingestion loop started");

        let result: WorkerResult<()> = loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ingestion loop cancelled");
                    break Ok(());
                }
                payload = subscription.recv() => payload,
            };

            let Some(payload) = payload else {
                error!(topic = subscription.topic(), "Telemetry subscription closed");
                break Err(TransportError::Closed.into());
            };

            match decode_event(&payload) {
                Ok(event) => {
                    let report = self.dispatcher.dispatch(event).await;
                    self.processed += 1;
                    debug!(
                        ingested_at = report.ingested_at,
                        outcomes = report.outcomes.len(),
                        "Event dispatched"
                    );
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, bytes = payload.len(), "Skipping malformed telemetry payload");
                }
            }
        };

        info!(
            processed = self.processed,
            skipped = self.skipped,
            "Ingestion loop stopped"
        );
        result
    }
}
