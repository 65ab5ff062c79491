//! Telemetry events and their wire envelope.

use crate::error::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a telemetry event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Periodic reading produced by the device.
    Monitor,
    /// Corrective target produced by the change processor.
    Remediate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Monitor => "Monitor",
            Action::Remediate => "Remediate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading emitted by a device.
///
/// Fields are read-only after construction. `Monitor` events come from
/// [`TelemetryEvent::monitor`]; `Remediate` events only from
/// [`RemediationCommand::to_event`](crate::RemediationCommand::to_event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "device")]
    device_id: String,
    temperature: f64,
    humidity: f64,
    action: Action,
}

impl TelemetryEvent {
    /// Build a monitoring reading.
    pub fn monitor(device_id: impl Into<String>, temperature: f64, humidity: f64) -> Self {
        Self {
            device_id: device_id.into(),
            temperature,
            humidity,
            action: Action::Monitor,
        }
    }

    pub(crate) fn remediate(device_id: String, temperature: f64, humidity: f64) -> Self {
        Self {
            device_id,
            temperature,
            humidity,
            action: Action::Remediate,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn action(&self) -> Action {
        self.action
    }
}

/// Transport wrapper: `{"body": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub body: T,
}

/// Serialize an event into a transport payload.
pub fn encode_event(event: &TelemetryEvent) -> TypesResult<Vec<u8>> {
    serde_json::to_vec(&Envelope { body: event }).map_err(TypesError::Encode)
}

/// Parse a transport payload into an event.
///
/// Missing fields or unknown actions are errors; nothing is defaulted.
pub fn decode_event(payload: &[u8]) -> TypesResult<TelemetryEvent> {
    let envelope: Envelope<TelemetryEvent> =
        serde_json::from_slice(payload).map_err(TypesError::Decode)?;
    Ok(envelope.body)
}
