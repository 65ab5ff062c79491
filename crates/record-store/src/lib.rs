//! Durable record store and its change log.
//!
//! Records are keyed by [`Digest`](telemetry_types::Digest) with
//! last-write-wins upserts. Every mutation appends a [`ChangeRecord`]
//! carrying the before and after images to an ordered change log, which the
//! remediation processor consumes in batches.
//!
//! # Backends
//!
//! - [`RedisRecordStore`] / [`RedisChangeLog`]: JSON values under
//!   `<table>:<digest>`, changes in the capped `<table>:changes` stream read
//!   through a consumer group
//! - [`MemoryRecordStore`] / [`MemoryChangeLog`]: in-process equivalent

mod change;
mod error;
mod memory;
mod redis_store;

pub use change::{ChangeBatch, ChangeKind, ChangeRecord, RecordImage, UpsertAck};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryChangeLog, MemoryRecordStore};
pub use redis_store::{
    ChangeLogConfig, ChangeRetention, RedisChangeLog, RedisRecordStore, DEFAULT_CHANGE_LOG_MAXLEN,
    DEFAULT_CONSUMER_NAME,
};

use async_trait::async_trait;
use telemetry_types::{ArchivedRecord, Digest};

/// Digest-keyed durable record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record stored under `record.digest`.
    async fn upsert(&self, record: &ArchivedRecord) -> StoreResult<UpsertAck>;

    async fn get(&self, digest: &Digest) -> StoreResult<Option<ArchivedRecord>>;

    /// Number of stored records.
    async fn len(&self) -> StoreResult<usize>;
}

/// Ordered, at-least-once feed of store mutations.
#[async_trait]
pub trait ChangeLog: Send {
    /// Wait for up to `max` unseen change records.
    ///
    /// Returns `None` when nothing arrived within the backend's block window.
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<ChangeBatch>>;

    /// Mark every record of `batch` as consumed.
    async fn ack(&mut self, batch: &ChangeBatch) -> StoreResult<()>;

    /// Re-establish the backend connection after a failed read.
    async fn reconnect(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
