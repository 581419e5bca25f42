//! Error types for the diffsync nodes.

use diffsync_cache::ProducerError;
use diffsync_core::ProtocolError;
use diffsync_stream::StreamError;
use thiserror::Error;

/// Errors that can occur while running a publisher or subscriber.
#[derive(Debug, Error)]
pub enum DiffSyncError {
    /// Envelope encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The producer cache refused a write.
    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),

    /// Broadcast or retransmission error.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, DiffSyncError>;
