//! Redis-backed record store and change log.
//!
//! Each upsert runs as one Lua script: read the previous value, write the
//! new one (with `EXPIREAT` when the record has a TTL) and `XADD` a change
//! record holding both images, trimming the stream to its retention cap. The
//! change stream is consumed through a consumer group so batches are
//! delivered at-least-once.

use crate::change::{ChangeBatch, ChangeKind, ChangeRecord, RecordImage, UpsertAck};
use crate::error::{StoreError, StoreResult};
use crate::{ChangeLog, RecordStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult, Script};
use telemetry_types::{ArchivedRecord, Digest};
use tracing::{debug, info, warn};

const UPSERT_SCRIPT: &str = r#"
local old = redis.call('GET', KEYS[1])
redis.call('SET', KEYS[1], ARGV[1])
if ARGV[2] ~= '' then
  redis.call('EXPIREAT', KEYS[1], ARGV[2])
end
local kind = 'MODIFY'
if not old then
  old = ''
  kind = 'INSERT'
end
if ARGV[3] == '0' then
  return {kind, ''}
end
local id = redis.call('XADD', KEYS[2], 'MAXLEN', '~', ARGV[3], '*', 'event_name', kind, 'old_image', old, 'new_image', ARGV[1])
return {kind, id}
"#;

/// Change records kept per table stream unless configured otherwise.
pub const DEFAULT_CHANGE_LOG_MAXLEN: usize = 10_000;

fn record_key(table: &str, digest: &Digest) -> String {
    format!("{}:{}", table, digest)
}

fn changes_key(table: &str) -> String {
    format!("{}:changes", table)
}

/// How much of a table's change stream Redis keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRetention {
    /// Upserts append no change records.
    Disabled,
    /// Approximate cap on the stream length (`XADD MAXLEN ~`).
    MaxLen(usize),
}

impl Default for ChangeRetention {
    fn default() -> Self {
        ChangeRetention::MaxLen(DEFAULT_CHANGE_LOG_MAXLEN)
    }
}

impl ChangeRetention {
    /// Script argument: `0` disables the stream, anything else is the cap.
    fn as_arg(&self) -> String {
        match self {
            ChangeRetention::Disabled => "0".to_string(),
            ChangeRetention::MaxLen(n) => (*n).max(1).to_string(),
        }
    }
}

/// `ARGV` for [`UPSERT_SCRIPT`]: value, absolute expiry (or empty), retention.
fn upsert_args(record: &ArchivedRecord, retention: ChangeRetention) -> StoreResult<[String; 3]> {
    let value = serde_json::to_string(record)?;
    let expire_at = record.ttl.map(|t| t.to_string()).unwrap_or_default();
    Ok([value, expire_at, retention.as_arg()])
}

/// Record store keeping JSON records in Redis.
#[derive(Clone)]
pub struct RedisRecordStore {
    conn: MultiplexedConnection,
    table: String,
    retention: ChangeRetention,
    upsert: Script,
}

impl RedisRecordStore {
    /// Connect and bind to `table` (the key prefix).
    pub async fn connect(redis_url: &str, table: impl Into<String>) -> StoreResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let table = table.into();
        info!(table = %table, "Connected record store");
        Ok(Self {
            conn,
            table,
            retention: ChangeRetention::default(),
            upsert: Script::new(UPSERT_SCRIPT),
        })
    }

    pub fn with_retention(mut self, retention: ChangeRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn retention(&self) -> ChangeRetention {
        self.retention
    }
}

impl std::fmt::Debug for RedisRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRecordStore")
            .field("table", &self.table)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn upsert(&self, record: &ArchivedRecord) -> StoreResult<UpsertAck> {
        let [value, expire_at, retention] = upsert_args(record, self.retention)?;

        let mut conn = self.conn.clone();
        let (kind, change_id): (String, String) = self
            .upsert
            .key(record_key(&self.table, &record.digest))
            .key(changes_key(&self.table))
            .arg(value)
            .arg(expire_at)
            .arg(retention)
            .invoke_async(&mut conn)
            .await?;

        let kind = ChangeKind::parse(&kind)
            .ok_or_else(|| StoreError::Protocol(format!("Unknown change kind {}", kind)))?;

        debug!(
            table = %self.table,
            digest = %record.digest,
            kind = kind.as_str(),
            change_id = %change_id,
            "Upserted record"
        );

        Ok(UpsertAck {
            digest: record.digest.clone(),
            kind,
            change_id,
        })
    }

    async fn get(&self, digest: &Digest) -> StoreResult<Option<ArchivedRecord>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(record_key(&self.table, digest)).await?;
        value
            .map(|v| serde_json::from_str(&v).map_err(StoreError::from))
            .transpose()
    }

    async fn len(&self) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.table);
        let stream = changes_key(&self.table);
        let mut cursor: u64 = 0;
        let mut count = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;
            count += keys.iter().filter(|k| **k != stream).count();
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(count)
    }
}

/// Consumer name used when none is configured.
pub const DEFAULT_CONSUMER_NAME: &str = "remediation-processor";

/// Settings for a [`RedisChangeLog`] reader.
#[derive(Debug, Clone)]
pub struct ChangeLogConfig {
    pub redis_url: String,
    /// Table whose change stream is read.
    pub table: String,
    pub consumer_group: String,
    /// Consumer name. Must be stable across restarts so the consumer's
    /// pending entries are redelivered to it.
    pub consumer_name: String,
    /// XREADGROUP block timeout in milliseconds
    pub block_timeout_ms: u64,
}

impl ChangeLogConfig {
    pub fn new(redis_url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            table: table.into(),
            consumer_group: "remediation".to_string(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            block_timeout_ms: 5000,
        }
    }

    pub fn stream_key(&self) -> String {
        changes_key(&self.table)
    }
}

/// Which part of the stream the next XREADGROUP asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPhase {
    /// Entries delivered to this consumer earlier but never acknowledged.
    Pending,
    /// Entries never delivered to any consumer of the group.
    New,
}

impl ReadPhase {
    fn stream_id(self) -> &'static str {
        match self {
            ReadPhase::Pending => "0",
            ReadPhase::New => ">",
        }
    }

    /// The pending list is drained once a pending read comes back empty.
    fn after(self, read: &StreamRead) -> Self {
        match self {
            ReadPhase::Pending if read.is_empty() => ReadPhase::New,
            phase => phase,
        }
    }
}

/// Consumer-group reader over a table's change stream.
///
/// Starts by re-reading its own pending entries (left by a previous run
/// that stopped before acknowledging) and then follows new entries.
pub struct RedisChangeLog {
    client: Client,
    conn: MultiplexedConnection,
    config: ChangeLogConfig,
    phase: ReadPhase,
}

impl RedisChangeLog {
    pub async fn connect(config: ChangeLogConfig) -> StoreResult<Self> {
        let client = Client::open(config.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;

        let log = Self {
            client,
            conn,
            config,
            phase: ReadPhase::Pending,
        };
        log.ensure_consumer_group().await?;
        Ok(log)
    }

    /// Ensure the consumer group exists, creating it (and the stream) if necessary.
    async fn ensure_consumer_group(&self) -> StoreResult<()> {
        let stream_key = self.config.stream_key();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream_key)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut self.conn.clone())
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %stream_key,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %stream_key,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    pub fn config(&self) -> &ChangeLogConfig {
        &self.config
    }

    async fn ack_ids(&mut self, ids: &[&str]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let stream_key = self.config.stream_key();
        let acked: i64 = self
            .conn
            .xack(&stream_key, &self.config.consumer_group, ids)
            .await?;

        if acked as usize != ids.len() {
            warn!(
                stream = %stream_key,
                expected = ids.len(),
                acked,
                "XACK count mismatch, some records may already be acknowledged"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeLog for RedisChangeLog {
    async fn reconnect(&mut self) -> StoreResult<()> {
        info!("Reconnecting change log to Redis...");
        self.conn = self.client.get_multiplexed_async_connection().await?;
        self.ensure_consumer_group().await?;
        self.phase = ReadPhase::Pending;
        Ok(())
    }

    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<ChangeBatch>> {
        let stream_key = self.config.stream_key();

        loop {
            let phase = self.phase;

            // XREADGROUP GROUP g c COUNT n [BLOCK ms] STREAMS key <0 | >>
            let mut cmd = redis::cmd("XREADGROUP");
            cmd.arg("GROUP")
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_name)
                .arg("COUNT")
                .arg(max.max(1));
            if phase == ReadPhase::New {
                cmd.arg("BLOCK").arg(self.config.block_timeout_ms);
            }
            cmd.arg("STREAMS").arg(&stream_key).arg(phase.stream_id());

            let value: redis::Value = cmd.query_async(&mut self.conn).await?;
            let read = parse_xreadgroup_response(value)?;

            self.phase = phase.after(&read);
            if self.phase != phase {
                info!(
                    stream = %stream_key,
                    consumer = %self.config.consumer_name,
                    "Pending changes drained"
                );
            }

            if !read.trimmed.is_empty() {
                warn!(
                    stream = %stream_key,
                    ids = ?read.trimmed,
                    "Pending changes were trimmed from the stream, acknowledging"
                );
                let ids: Vec<&str> = read.trimmed.iter().map(String::as_str).collect();
                self.ack_ids(&ids).await?;
            }

            if !read.records.is_empty() {
                debug!(
                    stream = %stream_key,
                    count = read.records.len(),
                    pending = phase == ReadPhase::Pending,
                    "Read change batch"
                );
                return Ok(Some(ChangeBatch::new(read.records)));
            }

            if phase == ReadPhase::New {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, batch: &ChangeBatch) -> StoreResult<()> {
        self.ack_ids(&batch.event_ids()).await
    }
}

fn value_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(s) => Some(String::from_utf8_lossy(s).to_string()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

/// One XREADGROUP reply.
#[derive(Debug, Default)]
pub(crate) struct StreamRead {
    pub records: Vec<ChangeRecord>,
    /// Pending IDs whose entries no longer exist in the stream.
    pub trimmed: Vec<String>,
}

impl StreamRead {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.trimmed.is_empty()
    }
}

/// Parse `[[stream_key, [[id, [field, value, ...] | nil], ...]]]`.
///
/// A nil field list only appears when re-reading pending entries that were
/// trimmed away; those IDs are reported in [`StreamRead::trimmed`].
pub(crate) fn parse_xreadgroup_response(value: redis::Value) -> StoreResult<StreamRead> {
    let streams = match value {
        redis::Value::Nil => return Ok(StreamRead::default()),
        redis::Value::Array(streams) => streams,
        other => {
            return Err(StoreError::Protocol(format!(
                "Unexpected XREADGROUP response type: {:?}",
                other
            )))
        }
    };

    let Some(stream) = streams.into_iter().next() else {
        return Ok(StreamRead::default());
    };

    let mut stream = match stream {
        redis::Value::Array(s) if s.len() >= 2 => s,
        _ => return Err(StoreError::Protocol("Malformed stream entry".to_string())),
    };

    let messages = match stream.swap_remove(1) {
        redis::Value::Array(m) => m,
        _ => return Err(StoreError::Protocol("Expected array for messages".to_string())),
    };

    let mut read = StreamRead {
        records: Vec::with_capacity(messages.len()),
        trimmed: Vec::new(),
    };
    for message in messages {
        let parts = match message {
            redis::Value::Array(parts) if parts.len() >= 2 => parts,
            _ => return Err(StoreError::Protocol("Malformed message entry".to_string())),
        };

        let event_id = value_to_string(&parts[0])
            .ok_or_else(|| StoreError::Protocol("Expected string for message ID".to_string()))?;

        let fields = match &parts[1] {
            redis::Value::Array(f) => f,
            redis::Value::Nil => {
                read.trimmed.push(event_id);
                continue;
            }
            _ => return Err(StoreError::Protocol("Expected array for fields".to_string())),
        };

        let mut kind = None;
        let mut old_image = None;
        let mut new_image = None;
        for pair in fields.chunks(2) {
            let [name, value] = pair else { continue };
            let (Some(name), Some(value)) = (value_to_string(name), value_to_string(value)) else {
                continue;
            };
            match name.as_str() {
                "event_name" => kind = ChangeKind::parse(&value),
                "old_image" => old_image = parse_image(&event_id, &value),
                "new_image" => new_image = parse_image(&event_id, &value),
                _ => {}
            }
        }

        let kind = kind.ok_or_else(|| {
            StoreError::Protocol(format!("Change {} missing event_name", event_id))
        })?;

        read.records.push(ChangeRecord {
            event_id,
            kind,
            old_image,
            new_image,
        });
    }

    Ok(read)
}

fn parse_image(event_id: &str, raw: &str) -> Option<RecordImage> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(event_id, error = %e, "Unreadable record image, treating as absent");
            None
        }
    }
}
