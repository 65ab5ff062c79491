//! Concurrent fan-out of one event to every registered sink.

use crate::error::SinkError;
use crate::sink::{Ingestion, Sink, SinkKind, SinkOutcome};
use crate::sinks::{ArchiveSink, MetricsPublisher, MetricsSink, ObjectStore, RecordSink};
use futures_util::future::join_all;
use record_store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use telemetry_types::{IngestionClock, TelemetryEvent};
use tracing::{error, info};

/// Default upper bound on a single sink write.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one dispatch produced.
#[derive(Debug)]
pub struct DispatchReport {
    /// Epoch seconds captured at dispatch entry.
    pub ingested_at: i64,
    /// One outcome per registered sink, in registration order.
    pub outcomes: Vec<SinkOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &SinkOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn outcome(&self, sink: SinkKind) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|o| o.sink == sink)
    }
}

pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    clock: Arc<dyn IngestionClock>,
    sink_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        sinks: Vec<Arc<dyn Sink>>,
        clock: Arc<dyn IngestionClock>,
        sink_timeout: Duration,
    ) -> Self {
        Self {
            sinks,
            clock,
            sink_timeout,
        }
    }

    /// The fixed metrics, archive and record sink set.
    pub fn standard(
        metrics: Arc<dyn MetricsPublisher>,
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        record_ttl_secs: i64,
        clock: Arc<dyn IngestionClock>,
        sink_timeout: Duration,
    ) -> Self {
        let sinks: Vec<Arc<dyn Sink>> = vec![
            Arc::new(MetricsSink::new(metrics)),
            Arc::new(ArchiveSink::new(objects)),
            Arc::new(RecordSink::with_ttl(records, record_ttl_secs)),
        ];
        Self::new(sinks, clock, sink_timeout)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Run every sink against `event` and wait for all of them.
    ///
    /// Each sink runs in its own task under the per-sink timeout. Failures,
    /// timeouts and panics become failed outcomes; the dispatch itself never
    /// fails.
    pub async fn dispatch(&self, event: TelemetryEvent) -> DispatchReport {
        let ingestion = Ingestion::new(Arc::new(event), self.clock.now_unix_secs());
        info!(
            ingested_at = ingestion.received_at,
            device_id = ingestion.event.device_id(),
            sinks = self.sinks.len(),
            "dispatch start"
        );

        let handles: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let kind = sink.kind();
                let ingestion = ingestion.clone();
                let limit = self.sink_timeout;
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(limit, sink.apply(&ingestion)).await {
                        Ok(result) => result,
                        Err(_) => Err(SinkError::Timeout(limit)),
                    }
                });
                (kind, handle)
            })
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let outcomes: Vec<SinkOutcome> = kinds
            .into_iter()
            .zip(joined)
            .map(|(kind, joined)| {
                let result = joined.unwrap_or_else(|e| Err(SinkError::Panicked(e.to_string())));
                SinkOutcome::from_result(kind, Arc::clone(&ingestion.event), result)
            })
            .collect();

        for outcome in outcomes.iter().filter(|o| !o.is_ok()) {
            if let Some(ref err) = outcome.error {
                error!(
                    sink = %outcome.sink,
                    ingested_at = ingestion.received_at,
                    device_id = outcome.event.device_id(),
                    error = %err,
                    "Sink write failed"
                );
            }
        }

        let report = DispatchReport {
            ingested_at: ingestion.received_at,
            outcomes,
        };
        info!(
            ingested_at = report.ingested_at,
            failed = report.failures().count(),
            "dispatch end"
        );
        report
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .field("sink_timeout", &self.sink_timeout)
            .finish_non_exhaustive()
    }
}
