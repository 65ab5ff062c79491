//! Metrics publication: two scalar datapoints per event.

use crate::error::{SinkError, SinkResult};
use crate::sink::{Ingestion, Sink, SinkKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemetry_types::TelemetryEvent;
use tracing::debug;

/// Namespace datapoints are published under.
pub const DEFAULT_NAMESPACE: &str = "Device/Monitoring";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDimension {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub metric_name: String,
    pub unit: String,
    pub value: f64,
    pub dimensions: Vec<MetricDimension>,
}

impl MetricDatum {
    fn for_device(name: &str, value: f64, device_id: &str) -> Self {
        Self {
            metric_name: name.to_string(),
            unit: "None".to_string(),
            value,
            dimensions: vec![MetricDimension {
                name: "Device".to_string(),
                value: device_id.to_string(),
            }],
        }
    }

    /// `Temperature` and `Humidity` datapoints tagged with the device id.
    pub fn from_event(event: &TelemetryEvent) -> Vec<Self> {
        vec![
            Self::for_device("Temperature", event.temperature(), event.device_id()),
            Self::for_device("Humidity", event.humidity(), event.device_id()),
        ]
    }
}

/// Destination for metric datapoints.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn put_metric_data(&self, namespace: &str, data: &[MetricDatum]) -> SinkResult<()>;
}

/// Publishes datapoints as JSON to an HTTP metrics endpoint.
#[derive(Clone)]
pub struct HttpMetricsPublisher {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpMetricsPublisher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl std::fmt::Debug for HttpMetricsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetricsPublisher")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetricsPublisher for HttpMetricsPublisher {
    async fn put_metric_data(&self, namespace: &str, data: &[MetricDatum]) -> SinkResult<()> {
        let body = serde_json::json!({
            "namespace": namespace,
            "metric_data": data,
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        super::check_response(response).await?;
        Ok(())
    }
}

/// Keeps published datapoints in memory.
#[derive(Debug, Default)]
pub struct MemoryMetricsPublisher {
    published: Mutex<Vec<(String, Vec<MetricDatum>)>>,
    fail: AtomicBool,
}

impl MemoryMetricsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every `(namespace, datapoints)` call received.
    pub fn published(&self) -> Vec<(String, Vec<MetricDatum>)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl MetricsPublisher for MemoryMetricsPublisher {
    async fn put_metric_data(&self, namespace: &str, data: &[MetricDatum]) -> SinkResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("metrics endpoint unavailable".to_string()));
        }
        self.published
            .lock()
            .push((namespace.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Sink emitting temperature and humidity as metrics.
pub struct MetricsSink {
    publisher: Arc<dyn MetricsPublisher>,
    namespace: String,
}

impl MetricsSink {
    pub fn new(publisher: Arc<dyn MetricsPublisher>) -> Self {
        Self::with_namespace(publisher, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(publisher: Arc<dyn MetricsPublisher>, namespace: impl Into<String>) -> Self {
        Self {
            publisher,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Sink for MetricsSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Metrics
    }

    async fn apply(&self, ingestion: &Ingestion) -> SinkResult<String> {
        let data = MetricDatum::from_event(&ingestion.event);
        self.publisher.put_metric_data(&self.namespace, &data).await?;
        debug!(
            namespace = %self.namespace,
            device_id = ingestion.event.device_id(),
            "Published metrics"
        );
        Ok(ingestion.event.action().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publishes_two_tagged_datapoints() {
        let publisher = Arc::new(MemoryMetricsPublisher::new());
        let sink = MetricsSink::new(publisher.clone());
        let ingestion = Ingestion::new(Arc::new(TelemetryEvent::monitor("d1", 27.5, 60.2)), 100);

        let result = sink.apply(&ingestion).await.unwrap();
        assert_eq!(result, "Monitor");

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        let (namespace, data) = &published[0];
        assert_eq!(namespace, DEFAULT_NAMESPACE);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].metric_name, "Temperature");
        assert_eq!(data[0].value, 27.5);
        assert_eq!(data[1].metric_name, "Humidity");
        assert_eq!(data[1].value, 60.2);
        for datum in data {
            assert_eq!(datum.dimensions[0].name, "Device");
            assert_eq!(datum.dimensions[0].value, "d1");
        }
    }

    #[tokio::test]
    async fn test_publisher_failure_is_returned() {
        let publisher = Arc::new(MemoryMetricsPublisher::new());
        publisher.set_fail(true);
        let sink = MetricsSink::new(publisher.clone());
        let ingestion = Ingestion::new(Arc::new(TelemetryEvent::monitor("d1", 27.5, 60.2)), 100);

        assert!(matches!(
            sink.apply(&ingestion).await,
            Err(SinkError::Unavailable(_))
        ));
        assert!(publisher.published().is_empty());
    }
}
