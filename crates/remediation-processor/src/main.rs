//! Remediation processor binary.
//!
//! Usage: remediation-processor [--remediation-logic true] [--building <id>]

use anyhow::Context;
use clap::Parser;
use pubsub_transport::{redact_endpoint, RedisTransport};
use record_store::{ChangeRetention, RedisChangeLog, RedisRecordStore};
use remediation_processor::{ChangeProcessor, ProcessorConfig, ProcessorLoop, ProcessorResult};
use std::sync::Arc;
use std::time::Duration;
use telemetry_types::SystemClock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Remediation processor: change batches in, remediation commands out.
#[derive(Parser, Debug)]
#[command(name = "remediation-processor")]
#[command(about = "Derives remediation commands from monitoring record changes")]
struct Args {
    /// Redis connection URL for the change log, record store and pub/sub.
    #[arg(long, env = "TRANSPORT_URL", default_value = "redis://127.0.0.1:6379")]
    transport_url: String,

    /// Building whose remediation topic receives commands.
    #[arg(long, env = "BUILDING", default_value = "1")]
    building: String,

    /// Build, persist and publish remediation commands.
    #[arg(long, env = "REMEDIATION_LOGIC", default_value = "false", action = clap::ArgAction::Set)]
    remediation_logic: bool,

    /// Table whose change log is consumed.
    #[arg(long, env = "MONITORING_TABLE", default_value = "monitoring")]
    monitoring_table: String,

    /// Table remediation commands are persisted to.
    #[arg(long, env = "REMEDIATION_TABLE", default_value = "remediation")]
    remediation_table: String,

    /// Consumer name in the change log's consumer group. Keep it stable
    /// across restarts.
    #[arg(long, env = "CONSUMER_NAME", default_value = "remediation-processor")]
    consumer_name: String,

    /// Maximum change records per batch.
    #[arg(long, env = "BATCH_SIZE", default_value = "100")]
    batch_size: usize,

    /// Change log read block timeout in milliseconds.
    #[arg(long, env = "BLOCK_MS", default_value = "5000")]
    block_ms: u64,

    /// Log level (ERROR, WARNING, INFO, DEBUG)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,
}

impl From<Args> for ProcessorConfig {
    fn from(args: Args) -> Self {
        Self {
            transport_url: args.transport_url,
            building: args.building,
            remediation_enabled: args.remediation_logic,
            monitoring_table: args.monitoring_table,
            remediation_table: args.remediation_table,
            consumer_name: args.consumer_name,
            batch_size: args.batch_size,
            block_timeout: Duration::from_millis(args.block_ms),
        }
    }
}

async fn connect_backends(
    config: &ProcessorConfig,
) -> ProcessorResult<(RedisChangeLog, RedisRecordStore, RedisTransport)> {
    let log = RedisChangeLog::connect(config.change_log()).await?;
    // Nothing consumes remediation changes.
    let records = RedisRecordStore::connect(&config.transport_url, &config.remediation_table)
        .await?
        .with_retention(ChangeRetention::Disabled);
    let transport = RedisTransport::connect(&config.transport_url).await?;
    Ok((log, records, transport))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "remediation-processor".into(),
        default_level: args.log_level.clone(),
        ..Default::default()
    });

    let config = ProcessorConfig::from(args);
    config.validate()?;

    info!(
        transport = %redact_endpoint(&config.transport_url),
        remediation_enabled = config.remediation_enabled,
        monitoring_table = %config.monitoring_table,
        remediation_table = %config.remediation_table,
        topic = %config.topics().remediation(),
        batch_size = config.batch_size,
        "Configuration loaded"
    );

    let (mut log, records, transport) = connect_backends(&config)
        .await
        .context("connecting to Redis")?;
    info!(
        stream = %log.config().stream_key(),
        consumer = %log.config().consumer_name,
        "Change log ready"
    );

    let processor = ChangeProcessor::new(
        Arc::new(records),
        Arc::new(transport),
        Arc::new(SystemClock),
        config.topics().remediation(),
        config.remediation_enabled,
    );
    let mut runner = ProcessorLoop::new(processor, config.batch_size);

    let cancel = CancellationToken::new();
    let run = runner.run(&mut log, cancel.clone());
    tokio::pin!(run);

    tokio::select! {
        _ = &mut run => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting...");
            cancel.cancel();
            run.await;
        }
    }

    Ok(())
}
