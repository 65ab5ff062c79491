//! Fan-out worker binary.
//!
//! Usage: fanout-worker [--building <id>] [--transport-url <url>]

use anyhow::Context;
use clap::Parser;
use fanout_worker::{
    ArchiveSink, Dispatcher, HttpMetricsPublisher, HttpObjectStore, IngestLoop, MetricsSink,
    RecordSink, Sink, WorkerConfig, WorkerResult,
};
use pubsub_transport::{redact_endpoint, RedisTransport, Transport};
use record_store::RedisRecordStore;
use std::sync::Arc;
use std::time::Duration;
use telemetry_types::SystemClock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fan-out worker: telemetry in, metrics, archive and records out.
#[derive(Parser, Debug)]
#[command(name = "fanout-worker")]
#[command(about = "Fans device telemetry out to metrics, archive and record sinks")]
struct Args {
    /// Redis connection URL for pub/sub and the record store.
    #[arg(long, env = "TRANSPORT_URL", default_value = "redis://127.0.0.1:6379")]
    transport_url: String,

    /// Building whose telemetry topic is consumed.
    #[arg(long, env = "BUILDING", default_value = "1")]
    building: String,

    /// Object store base URL.
    #[arg(long, env = "HISTORY_ENDPOINT", default_value = "http://127.0.0.1:9000")]
    history_endpoint: String,

    /// Object store bucket.
    #[arg(long, env = "HISTORY_BUCKET", default_value = "history")]
    history_bucket: String,

    /// Metrics endpoint URL.
    #[arg(long, env = "METRICS_ENDPOINT", default_value = "http://127.0.0.1:9100/metrics")]
    metrics_endpoint: String,

    /// Record store table for monitoring records.
    #[arg(long, env = "MONITORING_TABLE", default_value = "monitoring")]
    monitoring_table: String,

    /// Seconds a record lives past its ingestion time.
    #[arg(long, env = "RECORD_TTL_SECS", default_value = "60")]
    record_ttl_secs: i64,

    /// Approximate number of change records kept in the monitoring stream.
    #[arg(long, env = "CHANGE_LOG_MAXLEN", default_value = "10000")]
    change_log_maxlen: usize,

    /// Per-sink timeout in seconds.
    #[arg(long, env = "SINK_TIMEOUT_SECS", default_value = "30")]
    sink_timeout_secs: u64,

    /// Log level (ERROR, WARNING, INFO, DEBUG)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,
}

impl From<Args> for WorkerConfig {
    fn from(args: Args) -> Self {
        Self {
            transport_url: args.transport_url,
            building: args.building,
            history_endpoint: args.history_endpoint,
            history_bucket: args.history_bucket,
            metrics_endpoint: args.metrics_endpoint,
            monitoring_table: args.monitoring_table,
            record_ttl_secs: args.record_ttl_secs,
            change_log_maxlen: args.change_log_maxlen,
            sink_timeout: Duration::from_secs(args.sink_timeout_secs),
            ..Default::default()
        }
    }
}

async fn connect_backends(
    config: &WorkerConfig,
) -> WorkerResult<(RedisTransport, RedisRecordStore)> {
    let transport = RedisTransport::connect(&config.transport_url).await?;
    let records = RedisRecordStore::connect(&config.transport_url, &config.monitoring_table)
        .await?
        .with_retention(config.change_retention());
    Ok((transport, records))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "fanout-worker".into(),
        default_level: args.log_level.clone(),
        ..Default::default()
    });

    let config = WorkerConfig::from(args);
    config.validate()?;
    let topics = config.topics();

    info!(
        transport = %redact_endpoint(&config.transport_url),
        topic = %topics.telemetry(),
        bucket = %config.history_bucket,
        table = %config.monitoring_table,
        record_ttl_secs = config.record_ttl_secs,
        change_log_maxlen = config.change_log_maxlen,
        sink_timeout_secs = config.sink_timeout.as_secs(),
        "Configuration loaded"
    );

    let (transport, records) = connect_backends(&config)
        .await
        .context("connecting to Redis")?;

    let sinks: Vec<Arc<dyn Sink>> = vec![
        Arc::new(MetricsSink::with_namespace(
            Arc::new(HttpMetricsPublisher::new(config.metrics_endpoint.clone())),
            config.metrics_namespace.clone(),
        )),
        Arc::new(ArchiveSink::new(Arc::new(HttpObjectStore::new(
            config.history_endpoint.clone(),
            config.history_bucket.clone(),
        )))),
        Arc::new(RecordSink::with_ttl(Arc::new(records), config.record_ttl_secs)),
    ];
    let dispatcher = Dispatcher::new(sinks, Arc::new(SystemClock), config.sink_timeout);

    let subscription = transport
        .subscribe(&topics.telemetry())
        .await
        .context("subscribing to telemetry topic")?;

    let cancel = CancellationToken::new();
    let mut ingest = IngestLoop::new(dispatcher);
    let run = ingest.run(subscription, cancel.clone());
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result.context("telemetry ingestion stopped")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting...");
            cancel.cancel();
            run.await?;
        }
    }

    Ok(())
}
