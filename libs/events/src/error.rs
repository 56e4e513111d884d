//! Error types for notice and feed message handling.

use thiserror::Error;

/// Errors that can occur when decoding notices or feed messages.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The change kind is unknown.
    #[error("unknown change kind: {0}")]
    UnknownChangeKind(String),

    /// The message payload is invalid.
    #[error("invalid message payload: {0}")]
    InvalidPayload(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
