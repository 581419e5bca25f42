//! Producer cache: the authoritative store.
//!
//! Every document held here is a complete snapshot. Writes come in as full
//! documents and leave as change envelopes.

use std::collections::HashMap;

use diffsync_core::{Checksum, DataMsg, Document, EntryKey};

use crate::config::CacheConfig;
use crate::error::{ProducerError, Result};

/// Authoritative cache that turns full-state writes into change envelopes.
#[derive(Debug)]
pub struct ProducerCache {
    /// Last known full document per key.
    documents: HashMap<EntryKey, Document>,
    /// Configuration.
    config: CacheConfig,
}

impl ProducerCache {
    /// Create an empty producer cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            documents: HashMap::new(),
            config,
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Record a new full document and describe the change.
    ///
    /// Returns `NEW` the first time a key is seen and `UPDATE` (diff plus
    /// checksum of `document`) afterwards.
    pub fn update(&mut self, document: impl Into<Document>) -> Result<DataMsg> {
        let document = document.into();
        let key = self.extract_key(&document)?;

        let msg = match self.documents.get(&key) {
            None => DataMsg::new_data(key.clone(), document.clone()),
            Some(previous) => {
                let patch = json_patch::diff(previous, &document);
                if patch.0.is_empty() && self.config.strict {
                    return Err(ProducerError::NoOpUpdate(key));
                }
                DataMsg::upd_data(key.clone(), patch, Checksum::of(&document))
            }
        };

        tracing::debug!(key = %key, cmd = %msg.cmd, "producer update");
        self.documents.insert(key, self.config.copy_mode.store(&document));
        Ok(msg)
    }

    /// Remove a key and describe the removal.
    pub fn delete(&mut self, key: &EntryKey) -> Result<DataMsg> {
        self.documents
            .remove(key)
            .ok_or_else(|| ProducerError::UnknownKey(key.clone()))?;
        tracing::debug!(key = %key, "producer delete");
        Ok(DataMsg::del_data(key.clone()))
    }

    /// Full re-send of the current document for `key`.
    pub fn retransmit(&self, key: &EntryKey) -> Result<DataMsg> {
        let document = self
            .documents
            .get(key)
            .ok_or_else(|| ProducerError::UnknownKey(key.clone()))?;
        Ok(DataMsg::ret_data(key.clone(), document.clone()))
    }

    /// Retransmit a key received as raw bytes.
    ///
    /// The bytes are read as UTF-8 and resolved against the stored keys: a
    /// text key with the same spelling wins, then a decimal integer key.
    pub fn retransmit_raw(&self, raw: &[u8]) -> Result<DataMsg> {
        let text = String::from_utf8_lossy(raw);
        let key = self
            .resolve(&text)
            .ok_or_else(|| ProducerError::UnknownKey(EntryKey::from(text.as_ref())))?;
        self.retransmit(&key)
    }

    /// Resolve a textual key to one held by the cache.
    pub fn resolve(&self, raw: &str) -> Option<EntryKey> {
        EntryKey::candidates(raw)
            .into_iter()
            .find(|key| self.documents.contains_key(key))
    }

    /// Whether the cache holds `key`.
    pub fn contains(&self, key: &EntryKey) -> bool {
        self.documents.contains_key(key)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The current document for `key`.
    pub fn get(&self, key: &EntryKey) -> Option<&Document> {
        self.documents.get(key)
    }

    /// The current document for `key`, or `default`.
    pub fn get_or(&self, key: &EntryKey, default: Document) -> Document {
        self.documents.get(key).cloned().unwrap_or(default)
    }

    /// Iterate over the held keys.
    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.documents.keys()
    }

    fn extract_key(&self, document: &Document) -> Result<EntryKey> {
        let field = &self.config.key_field;
        let value = document
            .get(field.as_str())
            .ok_or_else(|| ProducerError::MissingKey {
                field: field.clone(),
            })?;
        EntryKey::from_value(value).ok_or_else(|| ProducerError::InvalidKey {
            field: field.clone(),
        })
    }
}

impl Default for ProducerCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CopyMode;
    use diffsync_core::Command;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const KEY: i64 = 314159;

    fn sample() -> Value {
        json!({"a": 1, "b": 2, "key": KEY})
    }

    #[test]
    fn test_first_update_is_new() {
        let mut producer = ProducerCache::default();
        let msg = producer.update(sample()).unwrap();

        assert_eq!(msg.cmd, Command::New);
        assert_eq!(msg.key, EntryKey::Int(KEY));
        assert_eq!(msg.document().map(|d| d.as_ref()), Some(&sample()));
        assert!(msg.checksum.is_none());
        assert!(producer.contains(&EntryKey::Int(KEY)));
    }

    #[test]
    fn test_second_update_is_diff() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();

        let mut next = sample();
        next["a"] = json!(3);
        let msg = producer.update(next.clone()).unwrap();

        assert_eq!(msg.cmd, Command::Update);
        assert_eq!(
            serde_json::to_value(msg.patch().unwrap()).unwrap(),
            json!([{"op": "replace", "path": "/a", "value": 3}])
        );
        assert_eq!(msg.checksum, Some(Checksum::of(&next)));
        assert_eq!(producer.get(&EntryKey::Int(KEY)).unwrap().as_ref(), &next);
    }

    #[test]
    fn test_missing_key_field() {
        let mut producer = ProducerCache::default();
        let err = producer.update(json!({"a": 1, "b": 2})).unwrap_err();
        assert!(matches!(err, ProducerError::MissingKey { field } if field == "key"));
        assert!(producer.is_empty());
    }

    #[test]
    fn test_invalid_key_field() {
        let mut producer = ProducerCache::default();
        let err = producer.update(json!({"key": [1, 2]})).unwrap_err();
        assert!(matches!(err, ProducerError::InvalidKey { .. }));
    }

    #[test]
    fn test_custom_key_field() {
        let mut producer = ProducerCache::new(CacheConfig::default().with_key_field("uid"));
        let msg = producer.update(json!({"uid": "abc", "v": 1})).unwrap();
        assert_eq!(msg.key, EntryKey::from("abc"));
    }

    #[test]
    fn test_strict_rejects_noop() {
        let mut producer = ProducerCache::new(CacheConfig::default().with_strict(true));
        producer.update(sample()).unwrap();
        let err = producer.update(sample()).unwrap_err();
        assert!(matches!(err, ProducerError::NoOpUpdate(EntryKey::Int(KEY))));
    }

    #[test]
    fn test_lenient_allows_noop() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();
        let msg = producer.update(sample()).unwrap();
        assert_eq!(msg.cmd, Command::Update);
        assert!(msg.patch().unwrap().0.is_empty());
    }

    #[test]
    fn test_delete() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();

        let msg = producer.delete(&EntryKey::Int(KEY)).unwrap();
        assert_eq!(msg, DataMsg::del_data(EntryKey::Int(KEY)));
        assert!(!producer.contains(&EntryKey::Int(KEY)));
        assert_eq!(producer.len(), 0);
    }

    #[test]
    fn test_delete_unknown_key() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();
        let err = producer.delete(&EntryKey::Int(KEY + 1)).unwrap_err();
        assert!(matches!(err, ProducerError::UnknownKey(EntryKey::Int(k)) if k == KEY + 1));
        assert_eq!(producer.len(), 1);
    }

    #[test]
    fn test_retransmit() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();
        let msg = producer.retransmit(&EntryKey::Int(KEY)).unwrap();
        assert_eq!(msg.cmd, Command::Retran);
        assert_eq!(msg.document().unwrap().as_ref(), &sample());
    }

    #[test]
    fn test_retransmit_unknown_key() {
        let producer = ProducerCache::default();
        let err = producer
            .retransmit(&EntryKey::from("KeyThatDoesNotExist"))
            .unwrap_err();
        assert!(matches!(err, ProducerError::UnknownKey(_)));
    }

    #[test]
    fn test_retransmit_with_byte_key() {
        let mut producer = ProducerCache::default();
        producer.update(json!({"key": "MyKey", "a": 1})).unwrap();
        let msg = producer.retransmit_raw(b"MyKey").unwrap();
        assert_eq!(msg.key, EntryKey::from("MyKey"));
    }

    #[test]
    fn test_retransmit_raw_resolves_integer_key() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();
        let msg = producer.retransmit_raw(KEY.to_string().as_bytes()).unwrap();
        assert_eq!(msg.key, EntryKey::Int(KEY));
    }

    #[test]
    fn test_retransmit_raw_prefers_text_key() {
        let mut producer = ProducerCache::default();
        producer.update(json!({"key": 7, "v": "int"})).unwrap();
        producer.update(json!({"key": "7", "v": "text"})).unwrap();
        let msg = producer.retransmit_raw(b"7").unwrap();
        assert_eq!(msg.document().unwrap()["v"], "text");
    }

    #[test]
    fn test_lookup_accessors() {
        let mut producer = ProducerCache::default();
        producer.update(sample()).unwrap();

        let stored = producer.get(&EntryKey::Int(KEY)).unwrap();
        assert_eq!(stored["key"], sample()["key"]);
        assert_eq!(stored["a"], sample()["a"]);

        let fallback: Document = Arc::new(Value::Null);
        let got = producer.get_or(&EntryKey::from("NonExistingKey"), fallback.clone());
        assert!(Arc::ptr_eq(&got, &fallback));
        assert_eq!(producer.keys().count(), 1);
    }

    #[test]
    fn test_deep_copy_on_store() {
        let mut producer = ProducerCache::default();
        let doc: Document = Arc::new(sample());
        producer.update(doc.clone()).unwrap();
        assert!(!Arc::ptr_eq(producer.get(&EntryKey::Int(KEY)).unwrap(), &doc));
    }

    #[test]
    fn test_shared_store() {
        let config = CacheConfig::default().with_copy_mode(CopyMode::Shared);
        let mut producer = ProducerCache::new(config);
        let mut doc: Document = Arc::new(sample());
        producer.update(doc.clone()).unwrap();
        assert!(Arc::ptr_eq(producer.get(&EntryKey::Int(KEY)).unwrap(), &doc));

        // Writing through the caller's handle clones instead of aliasing.
        Arc::make_mut(&mut doc)["a"] = json!(3);
        assert_eq!(producer.get(&EntryKey::Int(KEY)).unwrap()["a"], 1);
    }
}
