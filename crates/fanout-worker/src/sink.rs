//! The sink contract shared by every fan-out target.

use crate::error::{SinkError, SinkResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use telemetry_types::{Digest, TelemetryEvent};

/// Which fan-out target produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Metrics,
    Archive,
    Record,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Metrics => "metrics",
            SinkKind::Archive => "archive",
            SinkKind::Record => "record",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event as seen by the sinks of a single dispatch.
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub event: Arc<TelemetryEvent>,
    /// Epoch seconds captured once at dispatch entry.
    pub received_at: i64,
}

impl Ingestion {
    pub fn new(event: Arc<TelemetryEvent>, received_at: i64) -> Self {
        Self { event, received_at }
    }

    /// Key shared by the archive object and the stored record.
    pub fn digest(&self) -> Digest {
        Digest::from_unix_secs(self.received_at)
    }
}

/// An independent write target invoked during fan-out.
#[async_trait]
pub trait Sink: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// Perform exactly one external write for `ingestion`.
    ///
    /// The returned string describes the write (e.g. a serialized
    /// acknowledgement) and ends up in [`SinkOutcome::result`].
    async fn apply(&self, ingestion: &Ingestion) -> SinkResult<String>;
}

/// Result of one sink invocation.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: SinkKind,
    pub event: Arc<TelemetryEvent>,
    pub result: String,
    pub error: Option<SinkError>,
}

impl SinkOutcome {
    pub fn from_result(sink: SinkKind, event: Arc<TelemetryEvent>, result: SinkResult<String>) -> Self {
        match result {
            Ok(result) => Self {
                sink,
                event,
                result,
                error: None,
            },
            Err(error) => Self {
                sink,
                event,
                result: String::new(),
                error: Some(error),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
