//! Error types for the fan-out worker.

use pubsub_transport::TransportError;
use record_store::StoreError;
use std::time::Duration;
use telemetry_types::TypesError;
use thiserror::Error;

/// Failure of a single sink write.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Network or transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Endpoint error: {status} - {message}")]
    Endpoint { status: u16, message: String },

    /// Record store write failed
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Event could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] TypesError),

    /// Backend refused the write
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// Sink did not finish within its time budget
    #[error("Sink timed out after {0:?}")]
    Timeout(Duration),

    /// Sink task panicked or was aborted
    #[error("Sink task failed: {0}")]
    Panicked(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that stop the worker itself.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
