//! Error types for the record store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Record could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected change log response shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Store refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
