//! Test harness for the fan-out worker.
//!
//! Provides:
//! - TestHarness: a standard dispatcher wired to in-memory backends
//! - ScriptedSink: a sink that succeeds, fails, stalls or panics on demand

use crate::dispatcher::Dispatcher;
use crate::error::{SinkError, SinkResult};
use crate::sink::{Ingestion, Sink, SinkKind};
use crate::sinks::{MemoryMetricsPublisher, MemoryObjectStore};
use async_trait::async_trait;
use record_store::MemoryRecordStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_types::{FixedClock, TelemetryEvent};

pub const T0: i64 = 1_700_000_000;

/// Standard sinks over memory backends, with a clock fixed at [`T0`].
pub struct TestHarness {
    pub metrics: Arc<MemoryMetricsPublisher>,
    pub objects: Arc<MemoryObjectStore>,
    pub records: MemoryRecordStore,
    pub clock: Arc<FixedClock>,
    pub dispatcher: Dispatcher,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(sink_timeout: Duration) -> Self {
        let metrics = Arc::new(MemoryMetricsPublisher::new());
        let objects = Arc::new(MemoryObjectStore::new("history"));
        let records = MemoryRecordStore::new();
        let clock = Arc::new(FixedClock::new(T0));
        let dispatcher = Dispatcher::standard(
            metrics.clone(),
            objects.clone(),
            Arc::new(records.clone()),
            60,
            clock.clone(),
            sink_timeout,
        );
        Self {
            metrics,
            objects,
            records,
            clock,
            dispatcher,
        }
    }
}

pub fn monitor_event() -> TelemetryEvent {
    TelemetryEvent::monitor("d1", 27.5, 60.2)
}

/// What a [`ScriptedSink`] does when applied.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed(String),
    Fail,
    Stall(Duration),
    Panic,
}

/// Sink with a fixed behaviour that records every ingestion it saw.
pub struct ScriptedSink {
    kind: SinkKind,
    behaviour: Behaviour,
    calls: AtomicUsize,
    seen: parking_lot::Mutex<Vec<i64>>,
}

impl ScriptedSink {
    pub fn new(kind: SinkKind, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behaviour,
            calls: AtomicUsize::new(0),
            seen: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `received_at` of every ingestion applied.
    pub fn seen(&self) -> Vec<i64> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Sink for ScriptedSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    async fn apply(&self, ingestion: &Ingestion) -> SinkResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(ingestion.received_at);
        match &self.behaviour {
            Behaviour::Succeed(result) => Ok(result.clone()),
            Behaviour::Fail => Err(SinkError::Unavailable("scripted failure".to_string())),
            Behaviour::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late".to_string())
            }
            Behaviour::Panic => panic!("scripted sink panic"),
        }
    }
}

/// Dispatcher over scripted sinks with the clock fixed at [`T0`].
pub fn scripted_dispatcher(sinks: &[Arc<ScriptedSink>], sink_timeout: Duration) -> Dispatcher {
    let sinks: Vec<Arc<dyn Sink>> = sinks
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn Sink>)
        .collect();
    Dispatcher::new(sinks, Arc::new(FixedClock::new(T0)), sink_timeout)
}
