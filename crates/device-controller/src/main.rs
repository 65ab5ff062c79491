//! Device controller binary.
//!
//! Usage: device-controller [--device-id <id>] [--transport-url <url>]

use anyhow::Context;
use clap::Parser;
use device_controller::{ControllerConfig, DeviceController};
use pubsub_transport::RedisTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Simulated monitoring device with a remediation feedback loop.
#[derive(Parser, Debug)]
#[command(name = "device-controller")]
#[command(about = "Publishes simulated telemetry and reacts to remediation commands")]
struct Args {
    /// Device ID stamped on every reading.
    #[arg(long, env = "DEVICE_ID", default_value = "381938912")]
    device_id: String,

    /// Redis connection URL of the pub/sub transport.
    #[arg(long, env = "TRANSPORT_URL", default_value = "redis://127.0.0.1:6379")]
    transport_url: String,

    /// Building whose topics are used.
    #[arg(long, env = "BUILDING", default_value = "1")]
    building: String,

    /// Waveform amplitude without remediation.
    #[arg(long, env = "VELOCITY", default_value = "1.1")]
    velocity: f64,

    /// Waveform amplitude once remediating.
    #[arg(long, env = "REMEDIATION_FACTOR", default_value = "0.3")]
    remediation_factor: f64,

    /// Base environment temperature.
    #[arg(long, env = "MIN_TEMP", default_value = "27.0")]
    min_temp: f64,

    /// Base environment relative humidity.
    #[arg(long, env = "MIN_HUM", default_value = "60.0")]
    min_hum: f64,

    /// Seconds between readings.
    #[arg(long, env = "UPDATE_FREQUENCY", default_value = "2")]
    update_frequency: f64,

    /// Log level (ERROR, WARNING, INFO, DEBUG)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,
}

impl TryFrom<Args> for ControllerConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        let update_frequency = Duration::try_from_secs_f64(args.update_frequency)
            .context("update frequency must be a non-negative number of seconds")?;

        Ok(Self {
            device_id: args.device_id,
            transport_url: args.transport_url,
            building: args.building,
            velocity: args.velocity,
            remediation_factor: args.remediation_factor,
            min_temp: args.min_temp,
            min_hum: args.min_hum,
            update_frequency,
            log_level: observability::normalize_level(&args.log_level).to_uppercase(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "device-controller".into(),
        default_level: args.log_level.clone(),
        ..Default::default()
    });

    let config = ControllerConfig::try_from(args)?;
    config.validate()?;

    println!("{}", config.setup_summary());
    println!("Starting simulation...");

    let transport = RedisTransport::connect(&config.transport_url)
        .await
        .context("connecting to transport")?;
    let controller = DeviceController::new(config, Arc::new(transport));

    let cancel = CancellationToken::new();
    let run = controller.run(cancel.clone());
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, exiting...");
            cancel.cancel();
            run.await?;
        }
    }

    Ok(())
}
