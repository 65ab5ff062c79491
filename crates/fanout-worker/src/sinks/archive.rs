//! Object archival: the serialized event stored under the ingestion key.

use crate::error::{SinkError, SinkResult};
use crate::sink::{Ingestion, Sink, SinkKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemetry_types::encode_event;
use tracing::debug;

/// Write acknowledgement from an object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAck {
    pub bucket: String,
    pub key: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Key/value object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> SinkResult<ObjectAck>;
}

/// Object store reached with HTTP `PUT <endpoint>/<bucket>/<key>`.
#[derive(Clone)]
pub struct HttpObjectStore {
    http_client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> SinkResult<ObjectAck> {
        let location = self.object_url(key);

        let response = self
            .http_client
            .put(&location)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let response = super::check_response(response).await?;
        let etag = response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        Ok(ObjectAck {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            location,
            etag,
        })
    }
}

/// Object store kept in memory.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> SinkResult<ObjectAck> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("object store unavailable".to_string()));
        }
        self.objects.lock().insert(key.to_string(), body);
        Ok(ObjectAck {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            location: format!("memory://{}/{}", self.bucket, key),
            etag: None,
        })
    }
}

/// Sink writing the JSON event to the object store.
pub struct ArchiveSink {
    store: Arc<dyn ObjectStore>,
}

impl ArchiveSink {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Sink for ArchiveSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Archive
    }

    async fn apply(&self, ingestion: &Ingestion) -> SinkResult<String> {
        let key = ingestion.digest().to_string();
        let body = encode_event(&ingestion.event)?;
        debug!(key = %key, bytes = body.len(), "Archiving event");

        let ack = self.store.put_object(&key, body).await?;
        Ok(serde_json::to_string(&ack)?)
    }
}
