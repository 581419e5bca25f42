//! Error types for the stream module.

use diffsync_cache::ProducerError;
use diffsync_core::{Command, ProtocolError};
use thiserror::Error;

/// Errors that can occur while broadcasting or resynchronizing.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Bytes or frames could not be decoded or encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The producer cache refused the operation.
    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Timeout waiting for a reply.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The responder answered NACK.
    #[error("retransmission rejected (cid {correlation_id})")]
    Rejected { correlation_id: String },

    /// The reply did not answer the request.
    #[error("unexpected reply: {got} for cid {correlation_id}")]
    UnexpectedReply {
        got: Command,
        correlation_id: String,
    },
}

impl StreamError {
    /// Whether the failure concerns a single request and the caller can
    /// carry on with the next message.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StreamError::Timeout(_)
                | StreamError::Rejected { .. }
                | StreamError::UnexpectedReply { .. }
        )
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
