//! Error types for shared telemetry types.

use crate::event::Action;
use thiserror::Error;

/// Errors raised while encoding or decoding loop payloads.
#[derive(Error, Debug)]
pub enum TypesError {
    /// Payload is not a valid JSON envelope.
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// Event could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload carried a different action than the consumer accepts.
    #[error("Unexpected action: expected {expected}, found {found}")]
    UnexpectedAction { expected: Action, found: Action },
}

/// Result type for shared type conversions.
pub type TypesResult<T> = Result<T, TypesError>;
