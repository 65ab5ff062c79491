//! Batch processing: fold, decide, persist, publish.

use crate::error::ProcessorResult;
use parking_lot::Mutex;
use pubsub_transport::Transport;
use record_store::{ChangeBatch, RecordStore};
use std::fmt;
use std::sync::Arc;
use telemetry_types::{
    encode_event, ArchivedRecord, Digest, IngestionClock, RemediationCommand, StateDelta,
};
use tracing::{debug, error, info};

/// Where the processor is in its batch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorState {
    #[default]
    Idle,
    Processing {
        records: usize,
    },
}

/// Which way the last change moved temperature.
///
/// Reported for inspection only. The emitted command always targets the
/// pre-change values regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    CoolDown,
    WarmUp,
}

impl Direction {
    pub fn of(delta: &StateDelta) -> Self {
        if delta.is_rising() {
            Direction::CoolDown
        } else {
            Direction::WarmUp
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::CoolDown => f.write_str("cool down"),
            Direction::WarmUp => f.write_str("warm up"),
        }
    }
}

/// What processing one batch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// `None` for an empty batch.
    pub direction: Option<Direction>,
    /// `None` when the batch was empty or remediation is disabled.
    pub command: Option<RemediationCommand>,
    pub persisted: bool,
    pub published: bool,
}

/// Fold a batch into one delta, later records overwriting earlier values.
///
/// Only attributes present in an image overwrite; absent ones keep whatever
/// an earlier record (or the zero default) supplied.
pub fn fold_batch(batch: &ChangeBatch) -> StateDelta {
    let mut delta = StateDelta::default();

    for record in &batch.records {
        debug!(
            event_id = %record.event_id,
            kind = record.kind.as_str(),
            "Processing change record"
        );
        if let Some(ref new) = record.new_image {
            if let Some(ref device) = new.device {
                delta.device_id = device.clone();
            }
            if let Some(t) = new.temperature {
                delta.new_temperature = t;
            }
            if let Some(h) = new.humidity {
                delta.new_humidity = h;
            }
        }
        if let Some(ref old) = record.old_image {
            if let Some(t) = old.temperature {
                delta.old_temperature = t;
            }
            if let Some(h) = old.humidity {
                delta.old_humidity = h;
            }
        }
    }

    delta
}

pub struct ChangeProcessor {
    records: Arc<dyn RecordStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn IngestionClock>,
    topic: String,
    remediation_enabled: bool,
    state: Mutex<ProcessorState>,
}

impl ChangeProcessor {
    /// `records` is the remediation table; `topic` the remediation topic.
    pub fn new(
        records: Arc<dyn RecordStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn IngestionClock>,
        topic: impl Into<String>,
        remediation_enabled: bool,
    ) -> Self {
        Self {
            records,
            transport,
            clock,
            topic: topic.into(),
            remediation_enabled,
            state: Mutex::new(ProcessorState::Idle),
        }
    }

    pub fn state(&self) -> ProcessorState {
        *self.state.lock()
    }

    pub fn remediation_enabled(&self) -> bool {
        self.remediation_enabled
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Process one change batch.
    ///
    /// Never fails: persistence and publish errors are logged and reflected
    /// in the returned outcome.
    pub async fn process_batch(&self, batch: &ChangeBatch) -> BatchOutcome {
        if batch.is_empty() {
            debug!("Empty change batch, nothing to do");
            return BatchOutcome::default();
        }

        *self.state.lock() = ProcessorState::Processing {
            records: batch.len(),
        };

        let rendered = serde_json::to_string(batch).unwrap_or_default();
        if self.remediation_enabled {
            info!(records = batch.len(), batch = %rendered, "Remediation logic enabled for batch");
        } else {
            info!(records = batch.len(), batch = %rendered, "Remediation logic disabled for batch");
        }

        let delta = fold_batch(batch);
        let direction = Direction::of(&delta);
        debug!(
            device_id = %delta.device_id,
            direction = %direction,
            old_temperature = delta.old_temperature,
            old_humidity = delta.old_humidity,
            "Remediation direction"
        );

        let mut outcome = BatchOutcome {
            direction: Some(direction),
            ..Default::default()
        };

        if self.remediation_enabled {
            let command = RemediationCommand::from_delta(&delta);

            match self.persist(&command).await {
                Ok(digest) => {
                    debug!(digest = %digest, "Remediation command persisted");
                    outcome.persisted = true;
                }
                Err(e) => error!(error = %e, device_id = %command.device_id, "Failed to persist remediation command"),
            }

            match self.publish(&command).await {
                Ok(()) => {
                    info!(
                        device_id = %command.device_id,
                        temperature = command.temperature,
                        humidity = command.humidity,
                        topic = %self.topic,
                        "Remediation message sent"
                    );
                    outcome.published = true;
                }
                Err(e) => error!(error = %e, topic = %self.topic, "Failed to publish remediation command"),
            }

            outcome.command = Some(command);
        }

        *self.state.lock() = ProcessorState::Idle;
        outcome
    }

    async fn persist(&self, command: &RemediationCommand) -> ProcessorResult<Digest> {
        let digest = Digest::from_unix_secs(self.clock.now_unix_secs());
        let record = ArchivedRecord::from_event(&command.to_event(), digest.clone(), None);
        self.records.upsert(&record).await?;
        Ok(digest)
    }

    async fn publish(&self, command: &RemediationCommand) -> ProcessorResult<()> {
        let payload = encode_event(&command.to_event())?;
        self.transport.publish(&self.topic, payload).await?;
        Ok(())
    }
}
