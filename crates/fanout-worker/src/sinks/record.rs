//! Durable record upsert keyed by the ingestion digest.

use crate::error::SinkResult;
use crate::sink::{Ingestion, Sink, SinkKind};
use async_trait::async_trait;
use record_store::RecordStore;
use std::sync::Arc;
use telemetry_types::ArchivedRecord;
use tracing::debug;

/// Seconds a monitoring record lives past its ingestion time.
pub const DEFAULT_RECORD_TTL_SECS: i64 = 60;

pub struct RecordSink {
    store: Arc<dyn RecordStore>,
    ttl_secs: i64,
}

impl RecordSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_ttl(store, DEFAULT_RECORD_TTL_SECS)
    }

    pub fn with_ttl(store: Arc<dyn RecordStore>, ttl_secs: i64) -> Self {
        Self { store, ttl_secs }
    }

    fn to_record(&self, ingestion: &Ingestion) -> ArchivedRecord {
        ArchivedRecord::from_event(
            &ingestion.event,
            ingestion.digest(),
            Some(ingestion.received_at + self.ttl_secs),
        )
    }
}

#[async_trait]
impl Sink for RecordSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Record
    }

    async fn apply(&self, ingestion: &Ingestion) -> SinkResult<String> {
        let record = self.to_record(ingestion);
        let ack = self.store.upsert(&record).await?;
        debug!(digest = %record.digest, ttl = ?record.ttl, "Persisted record");
        Ok(serde_json::to_string(&ack)?)
    }
}
