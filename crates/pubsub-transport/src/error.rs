//! Error types for the pub/sub transport.

use thiserror::Error;

/// Transport error type.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Publish rejected by the transport
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Transport has been shut down
    #[error("Transport closed")]
    Closed,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
