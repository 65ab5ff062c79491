//! Configuration for the device controller.

use crate::error::{ControllerError, ControllerResult};
use pubsub_transport::{redact_endpoint, Topics};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Device identifier stamped on every reading
    pub device_id: String,

    /// Redis URL of the pub/sub transport
    pub transport_url: String,

    /// Building whose topics are used
    pub building: String,

    /// Waveform amplitude in neutral mode
    pub velocity: f64,

    /// Waveform amplitude once a remediation command arrived
    pub remediation_factor: f64,

    /// Base temperature the waveform oscillates around
    pub min_temp: f64,

    /// Base humidity the waveform oscillates around
    pub min_hum: f64,

    /// Time between readings
    pub update_frequency: Duration,

    /// Normalized log level, shown in the setup summary
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_id: "381938912".to_string(),
            transport_url: "redis://127.0.0.1:6379".to_string(),
            building: "1".to_string(),
            velocity: 1.1,
            remediation_factor: 0.3,
            min_temp: 27.0,
            min_hum: 60.0,
            update_frequency: Duration::from_secs(2),
            log_level: "INFO".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn topics(&self) -> Topics {
        Topics::new(self.building.clone())
    }

    pub fn validate(&self) -> ControllerResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(ControllerError::Config("device id must not be empty".to_string()));
        }
        if self.update_frequency.is_zero() {
            return Err(ControllerError::Config(
                "update frequency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Human-readable summary printed at startup.
    pub fn setup_summary(&self) -> String {
        format!(
            "Setup given:\n\n\
             \ttransport-url: {}\n\
             \tdevice-id: {:>13}\n\
             \tbuilding: {:>14}\n\
             \tmin-temp: {:>11.2} C°\n\
             \tmin-hum: {:>13.2} %\n\
             \tvelocity: {:>14.1}\n\
             \tupdate-frequency: {:>5.1}s\n\
             \tremediation-factor: {:>4.2}\n\
             \tlog-level: {:>13}\n",
            redact_endpoint(&self.transport_url),
            self.device_id,
            self.building,
            self.min_temp,
            self.min_hum,
            self.velocity,
            self.update_frequency.as_secs_f64(),
            self.remediation_factor,
            self.log_level,
        )
    }
}
