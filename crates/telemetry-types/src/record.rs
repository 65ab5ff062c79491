//! Records written to the durable record store.

use crate::event::{Action, TelemetryEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Partition key of an archived record.
///
/// Derived from the ingestion time in whole seconds, rendered as a decimal
/// string. Two writes in the same second share a digest and the later one
/// wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs.to_string())
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A telemetry event or remediation command as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    pub digest: Digest,
    pub device: String,
    pub temperature: f64,
    pub humidity: f64,
    pub action: Action,
    /// Expiry as epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl ArchivedRecord {
    pub fn from_event(event: &TelemetryEvent, digest: Digest, ttl: Option<i64>) -> Self {
        Self {
            digest,
            device: event.device_id().to_string(),
            temperature: event.temperature(),
            humidity: event.humidity(),
            action: event.action(),
            ttl,
        }
    }
}
