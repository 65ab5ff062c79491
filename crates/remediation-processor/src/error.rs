//! Error types for the change processor.

use pubsub_transport::TransportError;
use record_store::StoreError;
use telemetry_types::TypesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Record store or change log failure
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Publishing the command failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] TypesError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;
