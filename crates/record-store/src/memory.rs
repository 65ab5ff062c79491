//! In-process record store with an attached change log.

use crate::change::{ChangeBatch, ChangeKind, ChangeRecord, RecordImage, UpsertAck};
use crate::error::{StoreError, StoreResult};
use crate::{ChangeLog, RecordStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_types::{ArchivedRecord, Digest};
use tokio::sync::Notify;
use tracing::debug;

/// How long [`MemoryChangeLog::next_batch`] waits for new changes by default.
pub const DEFAULT_BLOCK: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<Digest, ArchivedRecord>,
    changes: Vec<ChangeRecord>,
}

/// Record store kept in memory.
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent upserts fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all records, ordered by digest.
    pub fn records(&self) -> Vec<ArchivedRecord> {
        self.inner.lock().records.values().cloned().collect()
    }

    /// Every change appended so far.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.inner.lock().changes.clone()
    }

    /// A change log reader starting at the first change.
    pub fn change_log(&self) -> MemoryChangeLog {
        MemoryChangeLog {
            store: self.clone(),
            cursor: 0,
            acked: Vec::new(),
            block: DEFAULT_BLOCK,
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn append_change(
        inner: &mut Inner,
        kind: ChangeKind,
        old_image: Option<RecordImage>,
        new_image: Option<RecordImage>,
    ) -> String {
        let event_id = format!("{}-0", inner.changes.len() + 1);
        inner.changes.push(ChangeRecord {
            event_id: event_id.clone(),
            kind,
            old_image,
            new_image,
        });
        event_id
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, record: &ArchivedRecord) -> StoreResult<UpsertAck> {
        self.check_writable()?;

        let ack = {
            let mut inner = self.inner.lock();
            let old = inner.records.insert(record.digest.clone(), record.clone());
            let kind = if old.is_some() {
                ChangeKind::Modify
            } else {
                ChangeKind::Insert
            };
            let change_id = Self::append_change(
                &mut inner,
                kind,
                old.as_ref().map(RecordImage::from),
                Some(RecordImage::from(record)),
            );
            UpsertAck {
                digest: record.digest.clone(),
                kind,
                change_id,
            }
        };

        debug!(digest = %ack.digest, kind = ack.kind.as_str(), "Upserted record");
        self.notify.notify_one();
        Ok(ack)
    }

    async fn get(&self, digest: &Digest) -> StoreResult<Option<ArchivedRecord>> {
        Ok(self.inner.lock().records.get(digest).cloned())
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.inner.lock().records.len())
    }
}

/// Change log reader over a [`MemoryRecordStore`].
#[derive(Debug)]
pub struct MemoryChangeLog {
    store: MemoryRecordStore,
    cursor: usize,
    acked: Vec<String>,
    block: Duration,
}

impl MemoryChangeLog {
    /// Set how long `next_batch` waits when nothing is pending.
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    /// Ids of every acknowledged change record, in ack order.
    pub fn acked(&self) -> &[String] {
        &self.acked
    }

    fn take(&mut self, max: usize) -> Option<ChangeBatch> {
        let inner = self.store.inner.lock();
        if self.cursor >= inner.changes.len() || max == 0 {
            return None;
        }
        let end = (self.cursor + max).min(inner.changes.len());
        let records = inner.changes[self.cursor..end].to_vec();
        self.cursor = end;
        Some(ChangeBatch::new(records))
    }
}

#[async_trait]
impl ChangeLog for MemoryChangeLog {
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<ChangeBatch>> {
        if let Some(batch) = self.take(max) {
            return Ok(Some(batch));
        }

        let notify = self.store.notify.clone();
        let _ = tokio::time::timeout(self.block, notify.notified()).await;
        Ok(self.take(max))
    }

    async fn ack(&mut self, batch: &ChangeBatch) -> StoreResult<()> {
        self.acked
            .extend(batch.records.iter().map(|r| r.event_id.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_types::TelemetryEvent;

    fn record(digest: i64, temperature: f64, humidity: f64) -> ArchivedRecord {
        let event = TelemetryEvent::monitor("d1", temperature, humidity);
        ArchivedRecord::from_event(&event, Digest::from_unix_secs(digest), Some(digest + 60))
    }

    #[tokio::test]
    async fn test_upsert_same_digest_is_last_write_wins() {
        let store = MemoryRecordStore::new();

        let first = store.upsert(&record(100, 27.0, 60.0)).await.unwrap();
        let second = store.upsert(&record(100, 28.0, 61.0)).await.unwrap();

        assert_eq!(first.kind, ChangeKind::Insert);
        assert_eq!(second.kind, ChangeKind::Modify);
        assert_eq!(store.len().await.unwrap(), 1);

        let stored = store.get(&Digest::from_unix_secs(100)).await.unwrap().unwrap();
        assert_eq!(stored.temperature, 28.0);
        assert_eq!(stored.humidity, 61.0);
    }

    #[tokio::test]
    async fn test_changes_carry_before_and_after_images() {
        let store = MemoryRecordStore::new();
        store.upsert(&record(100, 27.0, 60.0)).await.unwrap();
        store.upsert(&record(100, 28.0, 61.0)).await.unwrap();

        let changes = store.changes();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].old_image.is_none());
        assert_eq!(changes[0].new_image.as_ref().unwrap().temperature, Some(27.0));
        assert_eq!(changes[1].old_image.as_ref().unwrap().temperature, Some(27.0));
        assert_eq!(changes[1].new_image.as_ref().unwrap().temperature, Some(28.0));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryRecordStore::new();
        store.set_fail_writes(true);

        let err = store.upsert(&record(1, 1.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.changes().is_empty());
    }

    #[tokio::test]
    async fn test_change_log_batches_in_order() {
        let store = MemoryRecordStore::new();
        for ts in 0..5 {
            store.upsert(&record(ts, 20.0 + ts as f64, 60.0)).await.unwrap();
        }

        let mut log = store.change_log();
        let first = log.next_batch(3).await.unwrap().unwrap();
        let second = log.next_batch(3).await.unwrap().unwrap();

        assert_eq!(first.event_ids(), vec!["1-0", "2-0", "3-0"]);
        assert_eq!(second.event_ids(), vec!["4-0", "5-0"]);

        log.ack(&first).await.unwrap();
        log.ack(&second).await.unwrap();
        assert_eq!(log.acked().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_log_returns_none_when_idle() {
        let store = MemoryRecordStore::new();
        let mut log = store.change_log();
        assert!(log.next_batch(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_log_wakes_on_write() {
        let store = MemoryRecordStore::new();
        let mut log = store.change_log().with_block(Duration::from_secs(5));

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.upsert(&record(7, 25.0, 55.0)).await.unwrap();
        });

        let batch = log.next_batch(10).await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }
}
