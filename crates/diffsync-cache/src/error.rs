//! Error types for the caches.

use diffsync_core::{Checksum, Command, EntryKey};
use thiserror::Error;

/// Caller errors raised by the producer cache.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The document lacks the configured key field.
    #[error("document has no key field `{field}`")]
    MissingKey { field: String },

    /// The key field holds something other than a string or integer.
    #[error("key field `{field}` is not a string or integer")]
    InvalidKey { field: String },

    /// Delete or retransmit of a key the cache does not hold.
    #[error("unknown key: {0}")]
    UnknownKey(EntryKey),

    /// Strict mode: the update would transmit an empty diff.
    #[error("update for key {0} changes nothing")]
    NoOpUpdate(EntryKey),
}

/// Errors raised by [`ConsumerCache::apply`](crate::ConsumerCache::apply).
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Update for a key with no baseline (the `NEW` was missed).
    #[error("no existing entry for key {0}")]
    UnknownKey(EntryKey),

    /// The patch does not fit the stored document.
    #[error("could not apply update for key {key}: {reason}")]
    PatchConflict { key: EntryKey, reason: String },

    /// The patched document does not hash to the producer's checksum.
    #[error("checksum mismatch after update to {key} (expected {expected}, got {actual}); update discarded")]
    ChecksumMismatch {
        key: EntryKey,
        expected: Checksum,
        actual: Checksum,
    },

    /// Delete for a key already absent. The end state is already reached.
    #[error("delete for absent key {0}")]
    AlreadyAbsent(EntryKey),

    /// Command that cannot appear in a change envelope.
    #[error("invalid command {0} in change envelope")]
    InvalidCommand(Command),

    /// Payload or checksum does not match the command.
    #[error("malformed envelope for key {key}: {reason}")]
    MalformedEnvelope { key: EntryKey, reason: String },
}

impl ApplyError {
    /// Whether the mirror has diverged and a retransmission is needed.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            ApplyError::UnknownKey(_)
                | ApplyError::PatchConflict { .. }
                | ApplyError::ChecksumMismatch { .. }
        )
    }

    /// Whether the error is a warning with no data loss.
    pub fn is_benign(&self) -> bool {
        matches!(self, ApplyError::AlreadyAbsent(_))
    }

    /// The key the envelope addressed, when there is one.
    pub fn key(&self) -> Option<&EntryKey> {
        match self {
            ApplyError::UnknownKey(key)
            | ApplyError::AlreadyAbsent(key)
            | ApplyError::PatchConflict { key, .. }
            | ApplyError::ChecksumMismatch { key, .. }
            | ApplyError::MalformedEnvelope { key, .. } => Some(key),
            ApplyError::InvalidCommand(_) => None,
        }
    }
}

/// Result type for producer operations.
pub type Result<T> = std::result::Result<T, ProducerError>;
