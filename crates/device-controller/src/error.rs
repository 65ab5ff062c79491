//! Error types for the device controller.

use pubsub_transport::TransportError;
use telemetry_types::TypesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Payload was not a usable remediation command
    #[error("Decode error: {0}")]
    Decode(#[from] TypesError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
