//! Cache configuration.

use std::sync::Arc;

use diffsync_core::Document;
use serde_json::Value;

/// Default document field holding the key.
pub const DEFAULT_KEY_FIELD: &str = "key";

/// How a cache stores documents handed to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CopyMode {
    /// Store a private deep copy.
    #[default]
    Deep,
    /// Store the caller's handle.
    ///
    /// The cache and the caller then share one allocation. Documents are
    /// immutable behind [`Document`], so the caller cannot change what the
    /// cache holds; `Arc::make_mut` on the caller's side clones first.
    Shared,
}

impl CopyMode {
    /// Produce the handle a cache should store for `doc`.
    pub fn store(&self, doc: &Document) -> Document {
        match self {
            CopyMode::Deep => Arc::new(Value::clone(doc)),
            CopyMode::Shared => Arc::clone(doc),
        }
    }
}

/// What a consumer does with its old value after a checksum mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Keep the previous (now known-stale) document until repaired.
    #[default]
    KeepStale,
    /// Evict the key until a retransmission restores it.
    Evict,
}

/// Configuration shared by producer and consumer caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Document field the key is read from.
    pub key_field: String,
    /// Copy-on-store behaviour.
    pub copy_mode: CopyMode,
    /// Reject producer updates that change nothing.
    pub strict: bool,
    /// Consumer behaviour on checksum mismatch.
    pub checksum_policy: ChecksumPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            copy_mode: CopyMode::Deep,
            strict: false,
            checksum_policy: ChecksumPolicy::KeepStale,
        }
    }
}

impl CacheConfig {
    /// Read keys from a different field.
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Set the copy-on-store behaviour.
    pub fn with_copy_mode(mut self, mode: CopyMode) -> Self {
        self.copy_mode = mode;
        self
    }

    /// Enable or disable strict no-op rejection.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the checksum mismatch policy.
    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_copy_is_distinct_allocation() {
        let doc: Document = Arc::new(json!({"key": 1}));
        let stored = CopyMode::Deep.store(&doc);
        assert_eq!(stored, doc);
        assert!(!Arc::ptr_eq(&stored, &doc));
    }

    #[test]
    fn test_shared_is_same_allocation() {
        let doc: Document = Arc::new(json!({"key": 1}));
        let stored = CopyMode::Shared.store(&doc);
        assert!(Arc::ptr_eq(&stored, &doc));
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default()
            .with_key_field("id")
            .with_strict(true)
            .with_checksum_policy(ChecksumPolicy::Evict);
        assert_eq!(config.key_field, "id");
        assert!(config.strict);
        assert_eq!(config.copy_mode, CopyMode::Deep);
        assert_eq!(config.checksum_policy, ChecksumPolicy::Evict);
    }
}
