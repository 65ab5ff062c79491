//! The change log consumption loop.

use crate::processor::ChangeProcessor;
use record_store::{ChangeBatch, ChangeLog};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause before reconnecting after a failed read.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Pause after a failed reconnect.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Reads change batches, processes them and acknowledges them.
pub struct ProcessorLoop {
    processor: ChangeProcessor,
    batch_size: usize,
    batches: u64,
}

impl ProcessorLoop {
    pub fn new(processor: ChangeProcessor, batch_size: usize) -> Self {
        Self {
            processor,
            batch_size,
            batches: 0,
        }
    }

    pub fn processor(&self) -> &ChangeProcessor {
        &self.processor
    }

    /// Batches processed and acknowledged (or attempted) so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Consume `log` until `cancel` fires.
    pub async fn run<L: ChangeLog>(&mut self, log: &mut L, cancel: CancellationToken) {
        info!(
            batch_size = self.batch_size,
            remediation_enabled = self.processor.remediation_enabled(),
            topic = self.processor.topic(),
            "Change processor loop started"
        );

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = log.next_batch(self.batch_size) => next,
            };

            match next {
                Ok(Some(batch)) => self.handle(log, batch).await,
                Ok(None) => debug!("No changes within block window"),
                Err(e) => {
                    error!(error = %e, "Error reading change log");
                    warn!("Change log error, attempting to reconnect...");
                    if !sleep_or_cancel(RECONNECT_DELAY, &cancel).await {
                        break;
                    }
                    if let Err(reconnect_err) = log.reconnect().await {
                        error!(error = %reconnect_err, "Failed to reconnect change log");
                        if !sleep_or_cancel(RECONNECT_BACKOFF, &cancel).await {
                            break;
                        }
                    }
                }
            }
        }

        info!(batches = self.batches, "Change processor loop stopped");
    }

    async fn handle<L: ChangeLog>(&mut self, log: &mut L, batch: ChangeBatch) {
        let outcome = self.processor.process_batch(&batch).await;
        debug!(
            records = batch.len(),
            direction = ?outcome.direction,
            persisted = outcome.persisted,
            published = outcome.published,
            "Batch processed"
        );

        // Consumed regardless of per-step failures.
        if let Err(e) = log.ack(&batch).await {
            error!(error = %e, ids = ?batch.event_ids(), "Failed to acknowledge change batch");
        }
        self.batches += 1;
    }
}

/// Returns `false` if cancelled before `delay` elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
