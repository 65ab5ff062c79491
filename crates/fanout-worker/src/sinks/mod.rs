//! The three fan-out sinks and the backends they write to.

mod archive;
mod metrics;
mod record;

pub use archive::{ArchiveSink, HttpObjectStore, MemoryObjectStore, ObjectAck, ObjectStore};
pub use metrics::{
    HttpMetricsPublisher, MemoryMetricsPublisher, MetricDatum, MetricDimension,
    MetricsPublisher, MetricsSink, DEFAULT_NAMESPACE,
};
pub use record::{RecordSink, DEFAULT_RECORD_TTL_SECS};

/// Turn a non-success HTTP response into [`SinkError::Endpoint`](crate::SinkError::Endpoint).
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> crate::SinkResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Sink endpoint request failed: {} - {}", status, body);
        return Err(crate::SinkError::Endpoint {
            status,
            message: body,
        });
    }
    Ok(response)
}
