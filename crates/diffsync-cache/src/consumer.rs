//! Consumer cache: a mirror rebuilt from change envelopes.
//!
//! The consumer has no write path of its own. Its state is exactly what the
//! sequence of applied envelopes produces, so a dropped or reordered
//! envelope shows up as a fault on the next update for that key.

use std::collections::HashMap;
use std::sync::Arc;

use diffsync_core::{Checksum, Command, DataMsg, Document, EntryKey, Payload};
use serde_json::Value;

use crate::config::{CacheConfig, ChecksumPolicy};
use crate::error::ApplyError;

/// Outcome of a successful [`ConsumerCache::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The command that was applied.
    pub cmd: Command,
    /// The key it addressed.
    pub key: EntryKey,
    /// The resulting document (`None` after a delete).
    pub document: Option<Document>,
}

/// Mirrored cache fed by change envelopes.
#[derive(Debug)]
pub struct ConsumerCache {
    /// Materialized document per key.
    documents: HashMap<EntryKey, Document>,
    /// Configuration.
    config: CacheConfig,
    /// Envelopes seen per command, faulted ones included.
    stats: HashMap<Command, u64>,
}

impl ConsumerCache {
    /// Create an empty consumer cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            documents: HashMap::new(),
            config,
            stats: HashMap::new(),
        }
    }

    /// Apply one change envelope.
    ///
    /// `UnknownKey`, `PatchConflict`, and `ChecksumMismatch` mean the mirror
    /// has diverged for `msg.key`; the caller should request a
    /// retransmission. `AlreadyAbsent` needs no action.
    pub fn apply(&mut self, msg: &DataMsg) -> Result<Applied, ApplyError> {
        *self.stats.entry(msg.cmd).or_insert(0) += 1;

        let result = match msg.cmd {
            Command::New | Command::Retran => self.apply_full(msg),
            Command::Update => self.apply_update(msg),
            Command::Delete => self.apply_delete(msg),
            Command::Ack | Command::Nack => Err(ApplyError::InvalidCommand(msg.cmd)),
        };

        match &result {
            Ok(_) => tracing::debug!(key = %msg.key, cmd = %msg.cmd, "applied"),
            Err(e) if e.is_desync() => tracing::warn!(key = %msg.key, error = %e, "desync"),
            Err(e) => tracing::debug!(key = %msg.key, error = %e, "not applied"),
        }
        result
    }

    /// Store a full document unconditionally.
    fn apply_full(&mut self, msg: &DataMsg) -> Result<Applied, ApplyError> {
        let document = msg
            .document()
            .ok_or_else(|| malformed(msg, "missing document"))?;
        let stored = self.config.copy_mode.store(document);
        self.documents.insert(msg.key.clone(), stored.clone());
        Ok(Applied {
            cmd: msg.cmd,
            key: msg.key.clone(),
            document: Some(stored),
        })
    }

    /// Patch the stored document, verify, then adopt.
    fn apply_update(&mut self, msg: &DataMsg) -> Result<Applied, ApplyError> {
        let (patch, expected) = match (&msg.payload, msg.checksum) {
            (Payload::Patch(patch), Some(checksum)) => (patch, checksum),
            _ => return Err(malformed(msg, "update needs a patch and a checksum")),
        };

        let current = self
            .documents
            .get(&msg.key)
            .ok_or_else(|| ApplyError::UnknownKey(msg.key.clone()))?;

        let mut next = Value::clone(current);
        json_patch::patch(&mut next, patch).map_err(|e| ApplyError::PatchConflict {
            key: msg.key.clone(),
            reason: e.to_string(),
        })?;

        let actual = Checksum::of(&next);
        if actual != expected {
            if self.config.checksum_policy == ChecksumPolicy::Evict {
                self.documents.remove(&msg.key);
            }
            return Err(ApplyError::ChecksumMismatch {
                key: msg.key.clone(),
                expected,
                actual,
            });
        }

        let document = Arc::new(next);
        self.documents.insert(msg.key.clone(), document.clone());
        Ok(Applied {
            cmd: msg.cmd,
            key: msg.key.clone(),
            document: Some(document),
        })
    }

    fn apply_delete(&mut self, msg: &DataMsg) -> Result<Applied, ApplyError> {
        self.documents
            .remove(&msg.key)
            .ok_or_else(|| ApplyError::AlreadyAbsent(msg.key.clone()))?;
        Ok(Applied {
            cmd: msg.cmd,
            key: msg.key.clone(),
            document: None,
        })
    }

    /// Whether the mirror holds `key`.
    pub fn contains(&self, key: &EntryKey) -> bool {
        self.documents.contains_key(key)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the mirror is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The mirrored document for `key`.
    pub fn get(&self, key: &EntryKey) -> Option<&Document> {
        self.documents.get(key)
    }

    /// The mirrored document for `key`, or `default`.
    pub fn get_or(&self, key: &EntryKey, default: Document) -> Document {
        self.documents.get(key).cloned().unwrap_or(default)
    }

    /// Iterate over the held keys.
    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.documents.keys()
    }

    /// Envelopes applied per command, faulted ones included.
    pub fn stats(&self) -> &HashMap<Command, u64> {
        &self.stats
    }
}

impl Default for ConsumerCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn malformed(msg: &DataMsg, reason: &str) -> ApplyError {
    ApplyError::MalformedEnvelope {
        key: msg.key.clone(),
        reason: reason.to_string(),
    }
}
