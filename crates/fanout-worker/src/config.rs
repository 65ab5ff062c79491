//! Configuration for the fan-out worker.

use crate::dispatcher::DEFAULT_SINK_TIMEOUT;
use crate::error::{WorkerError, WorkerResult};
use crate::sinks::{DEFAULT_NAMESPACE, DEFAULT_RECORD_TTL_SECS};
use pubsub_transport::Topics;
use record_store::{ChangeRetention, DEFAULT_CHANGE_LOG_MAXLEN};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis URL used for pub/sub and the record store
    pub transport_url: String,

    /// Building whose telemetry topic is consumed
    pub building: String,

    /// Object store base URL
    pub history_endpoint: String,

    /// Object store bucket for archived events
    pub history_bucket: String,

    /// Metrics endpoint URL
    pub metrics_endpoint: String,

    /// Metrics namespace
    pub metrics_namespace: String,

    /// Record store table for monitoring records
    pub monitoring_table: String,

    /// Seconds a monitoring record lives past ingestion
    pub record_ttl_secs: i64,

    /// Approximate number of change records the monitoring stream keeps
    pub change_log_maxlen: usize,

    /// Upper bound on a single sink write
    pub sink_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            transport_url: "redis://127.0.0.1:6379".to_string(),
            building: "1".to_string(),
            history_endpoint: "http://127.0.0.1:9000".to_string(),
            history_bucket: "history".to_string(),
            metrics_endpoint: "http://127.0.0.1:9100/metrics".to_string(),
            metrics_namespace: DEFAULT_NAMESPACE.to_string(),
            monitoring_table: "monitoring".to_string(),
            record_ttl_secs: DEFAULT_RECORD_TTL_SECS,
            change_log_maxlen: DEFAULT_CHANGE_LOG_MAXLEN,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    pub fn topics(&self) -> Topics {
        Topics::new(self.building.clone())
    }

    pub fn change_retention(&self) -> ChangeRetention {
        ChangeRetention::MaxLen(self.change_log_maxlen)
    }

    /// Reject settings no sink can work with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.building.trim().is_empty() {
            return Err(WorkerError::Config("building must not be empty".to_string()));
        }
        if self.record_ttl_secs < 0 {
            return Err(WorkerError::Config(format!(
                "record TTL must not be negative, got {}",
                self.record_ttl_secs
            )));
        }
        if self.sink_timeout.is_zero() {
            return Err(WorkerError::Config("sink timeout must be positive".to_string()));
        }
        if self.change_log_maxlen == 0 {
            return Err(WorkerError::Config(
                "change log length cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.record_ttl_secs, 60);
        assert_eq!(config.sink_timeout, Duration::from_secs(30));
        assert_eq!(config.monitoring_table, "monitoring");
        assert_eq!(config.metrics_namespace, "Device/Monitoring");
        assert_eq!(config.change_retention(), ChangeRetention::MaxLen(10_000));
    }

    #[test]
    fn test_topic_follows_building() {
        let config = WorkerConfig {
            building: "7".to_string(),
            ..Default::default()
        };
        assert_eq!(config.topics().telemetry(), "telemetry/7");
    }

    #[test]
    fn test_validate() {
        assert!(WorkerConfig::default().validate().is_ok());

        let negative_ttl = WorkerConfig {
            record_ttl_secs: -1,
            ..Default::default()
        };
        assert!(matches!(negative_ttl.validate(), Err(WorkerError::Config(_))));

        let zero_timeout = WorkerConfig {
            sink_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let unbounded_log = WorkerConfig {
            change_log_maxlen: 0,
            ..Default::default()
        };
        assert!(matches!(unbounded_log.validate(), Err(WorkerError::Config(_))));
    }
}
