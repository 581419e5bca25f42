//! Error types for the core vocabulary.

use thiserror::Error;

/// Protocol-level errors: the bytes or fields themselves are unusable.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    #[error("malformed frame: expected {expected} parts, got {got}")]
    MalformedFrame { expected: usize, got: usize },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Decode(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
