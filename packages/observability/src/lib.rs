//! # Observability
//!
//! Structured logging for the thermoloop services.
//!
//! Services call [`init_with_config`] once at startup and then use the plain
//! `tracing` macros. Every event is written to stdout as one JSON object per
//! line, so the controller, the fan-out worker and the remediation processor
//! can all be tailed and filtered with the same tooling:
//!
//! ```text
//! {"timestamp":"...","level":"INFO","service":"fanout-worker","pid":42,
//!  "target":"fanout_worker::dispatcher","message":"dispatch end","fields":{...}}
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "device-controller".into(),
//!     default_level: observability::normalize_level("WARNING").into(),
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;

pub use json_layer::{JsonLayer, LogEntry, StdoutWriter};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default level filter (e.g., "debug", "info", "warn").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Also write a compact human-readable copy to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_with_config(config: LogConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(&config.default_level)));

    let json = JsonLayer::new(config.service_name.clone(), StdoutWriter::default());

    let stderr = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(stderr)
        .try_init();
}

/// Map a user-supplied level name onto a `tracing` filter directive.
///
/// Accepts the upper-case names used in deployment environments
/// (`ERROR`, `WARNING`, `INFO`, `DEBUG`) as well as the lower-case
/// `tracing` names. Anything else falls back to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}
