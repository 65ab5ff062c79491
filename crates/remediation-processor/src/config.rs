//! Configuration for the change processor.

use crate::error::{ProcessorError, ProcessorResult};
use pubsub_transport::Topics;
use record_store::{ChangeLogConfig, DEFAULT_CONSUMER_NAME};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Redis URL used for the change log, record store and pub/sub
    pub transport_url: String,

    /// Building whose remediation topic receives commands
    pub building: String,

    /// Whether commands are built, persisted and published at all
    pub remediation_enabled: bool,

    /// Table whose change log is consumed
    pub monitoring_table: String,

    /// Table remediation commands are persisted to
    pub remediation_table: String,

    /// Consumer name within the change log's consumer group. Kept across
    /// restarts so unacknowledged batches are read again.
    pub consumer_name: String,

    /// Maximum change records per batch
    pub batch_size: usize,

    /// How long one change log read may block
    pub block_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            transport_url: "redis://127.0.0.1:6379".to_string(),
            building: "1".to_string(),
            remediation_enabled: false,
            monitoring_table: "monitoring".to_string(),
            remediation_table: "remediation".to_string(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            batch_size: 100,
            block_timeout: Duration::from_millis(5000),
        }
    }
}

impl ProcessorConfig {
    pub fn topics(&self) -> Topics {
        Topics::new(self.building.clone())
    }

    /// Change log reader settings for the monitoring table.
    pub fn change_log(&self) -> ChangeLogConfig {
        let mut config = ChangeLogConfig::new(&self.transport_url, &self.monitoring_table);
        config.consumer_name = self.consumer_name.clone();
        config.block_timeout_ms = self.block_timeout.as_millis() as u64;
        config
    }

    pub fn validate(&self) -> ProcessorResult<()> {
        if self.consumer_name.trim().is_empty() {
            return Err(ProcessorError::Config(
                "consumer name must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ProcessorError::Config("batch size must be positive".to_string()));
        }
        if self.monitoring_table == self.remediation_table {
            return Err(ProcessorError::Config(format!(
                "monitoring and remediation tables must differ, both are {:?}",
                self.monitoring_table
            )));
        }
        Ok(())
    }
}
