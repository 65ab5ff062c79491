//! State deltas and the remediation commands derived from them.

use crate::error::{TypesError, TypesResult};
use crate::event::{Action, TelemetryEvent};

/// Before/after values for one device, taken from the change log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub device_id: String,
    pub new_temperature: f64,
    pub old_temperature: f64,
    pub new_humidity: f64,
    pub old_humidity: f64,
}

impl StateDelta {
    /// True when the change moved temperature upward.
    pub fn is_rising(&self) -> bool {
        self.new_temperature > self.old_temperature
    }

    /// Pre-change values the device should steer back toward.
    ///
    /// A zero old temperature or humidity means there was no prior image;
    /// the new values are used as the baseline instead.
    pub fn baseline(&self) -> (f64, f64) {
        if self.old_temperature == 0.0 || self.old_humidity == 0.0 {
            (self.new_temperature, self.new_humidity)
        } else {
            (self.old_temperature, self.old_humidity)
        }
    }
}

/// Corrective instruction published back to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationCommand {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl RemediationCommand {
    pub fn new(device_id: impl Into<String>, temperature: f64, humidity: f64) -> Self {
        Self {
            device_id: device_id.into(),
            temperature,
            humidity,
        }
    }

    /// Target the pre-change values of `delta`.
    pub fn from_delta(delta: &StateDelta) -> Self {
        let (temperature, humidity) = delta.baseline();
        Self::new(delta.device_id.clone(), temperature, humidity)
    }

    /// The command as a `Remediate` telemetry event.
    pub fn to_event(&self) -> TelemetryEvent {
        TelemetryEvent::remediate(self.device_id.clone(), self.temperature, self.humidity)
    }

    /// Accept only `Remediate` events.
    pub fn try_from_event(event: TelemetryEvent) -> TypesResult<Self> {
        match event.action() {
            Action::Remediate => Ok(Self::new(
                event.device_id(),
                event.temperature(),
                event.humidity(),
            )),
            found => Err(TypesError::UnexpectedAction {
                expected: Action::Remediate,
                found,
            }),
        }
    }
}
