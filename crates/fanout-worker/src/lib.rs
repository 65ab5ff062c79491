//! Fan-out worker: one telemetry event in, three independent writes out.
//!
//! ```text
//!                          ┌──▶ MetricsSink ──▶ metrics endpoint
//! telemetry/<building> ──▶ Dispatcher ─┼──▶ ArchiveSink ──▶ object store
//!                          └──▶ RecordSink  ──▶ record store ──▶ change log
//! ```
//!
//! # Guarantees
//!
//! 1. **Structural completion**: [`Dispatcher::dispatch`] returns only after
//!    every sink has produced exactly one [`SinkOutcome`]
//! 2. **Isolation**: a failing, slow or panicking sink never cancels or
//!    blocks its siblings beyond the per-sink timeout
//! 3. **One timestamp**: all sinks see the ingestion time captured once at
//!    dispatch entry, so archive key and record digest agree
//! 4. **No retries**: failures are logged and reported, never retried

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod sink;
pub mod sinks;

#[cfg(test)]
mod tests;

pub use config::WorkerConfig;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{SinkError, SinkResult, WorkerError, WorkerResult};
pub use ingest::IngestLoop;
pub use sink::{Ingestion, Sink, SinkKind, SinkOutcome};
pub use sinks::{
    ArchiveSink, HttpMetricsPublisher, HttpObjectStore, MemoryMetricsPublisher,
    MemoryObjectStore, MetricDatum, MetricsPublisher, MetricsSink, ObjectAck, ObjectStore,
    RecordSink,
};
