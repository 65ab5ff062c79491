//! Device feedback controller.
//!
//! Publishes a synthetic reading on `telemetry/<building>` every tick and
//! listens on `remediation/<building>` for commands that switch the
//! controller between its generation modes.
//!
//! ```text
//! tick ──▶ next_reading() ──▶ publish(telemetry)
//!              ▲ reads mode
//!              │
//! remediation ──▶ apply_command() writes mode
//! ```

pub mod config;
pub mod controller;
pub mod error;

pub use config::ControllerConfig;
pub use controller::{DeviceController, Reading};
pub use error::{ControllerError, ControllerResult};
