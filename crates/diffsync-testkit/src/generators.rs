//! Proptest generators for property-based testing.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value};

use diffsync_core::{Checksum, DataMsg, EntryKey};

/// Generate an entry key, integer or text.
pub fn entry_key() -> impl Strategy<Value = EntryKey> {
    prop_oneof![
        any::<i64>().prop_map(EntryKey::Int),
        "[a-zA-Z0-9_-]{1,16}".prop_map(EntryKey::Text),
    ]
}

/// Generate a field name. Includes the JSON pointer escapes `~` and `/`.
pub fn field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,8}",
        1 => "[a-z]{0,3}[~/][a-z]{0,3}",
    ]
}

/// Generate a scalar value. Floats are left out so equality is exact.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::String),
    ]
}

/// Generate a field value: a scalar, a small array or a small nested object.
pub fn field_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(field_name(), inner, 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Generate a document holding `key` under `key_field`.
pub fn document_with_key(key: EntryKey, key_field: &'static str) -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name(), field_value(), 0..8).prop_map(move |fields| {
        let mut doc: Map<String, Value> = fields.into_iter().collect();
        doc.insert(key_field.to_owned(), key.to_value());
        Value::Object(doc)
    })
}

/// Generate a document with a random key under `"key"`.
pub fn document() -> impl Strategy<Value = Value> {
    entry_key().prop_flat_map(|key| document_with_key(key, "key"))
}

/// Generate successive versions of one document, all with the same key.
pub fn edit_sequence(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    entry_key().prop_flat_map(move |key| {
        prop::collection::vec(document_with_key(key, "key"), 1..=max_len.max(1))
    })
}

/// Generate writes and deletes against one key.
///
/// `Some(doc)` is a write, `None` a delete. A write after a delete
/// re-creates the key.
pub fn write_delete_sequence(
    max_len: usize,
) -> impl Strategy<Value = (EntryKey, Vec<Option<Value>>)> {
    entry_key().prop_flat_map(move |key| {
        let step = prop_oneof![
            3 => document_with_key(key.clone(), "key").prop_map(Some),
            1 => Just(None),
        ];
        (Just(key), prop::collection::vec(step, 1..=max_len.max(1)))
    })
}

/// Generate a well-formed change envelope of any data kind.
pub fn data_msg() -> impl Strategy<Value = DataMsg> {
    (document(), document(), 0..4u8).prop_map(|(before, after, kind)| {
        let key = EntryKey::from_value(&after["key"]).unwrap_or(EntryKey::Int(0));
        match kind {
            0 => DataMsg::new_data(key, Arc::new(after)),
            1 => DataMsg::upd_data(key, json_patch::diff(&before, &after), Checksum::of(&after)),
            2 => DataMsg::del_data(key),
            _ => DataMsg::ret_data(key, Arc::new(after)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffsync_core::{Codec, Command};

    use crate::fixtures::CachePair;

    proptest! {
        #[test]
        fn test_json_round_trip(msg in data_msg()) {
            let bytes = Codec::Json.encode(&msg).unwrap();
            prop_assert_eq!(Codec::Json.decode(&bytes).unwrap(), msg);
        }

        #[test]
        fn test_cbor_round_trip(msg in data_msg()) {
            let bytes = Codec::Cbor.encode(&msg).unwrap();
            prop_assert_eq!(Codec::Cbor.decode(&bytes).unwrap(), msg);
        }

        #[test]
        fn test_patch_reproduces_target(before in document(), after in document()) {
            let patch = json_patch::diff(&before, &after);
            let mut patched = before.clone();
            json_patch::patch(&mut patched, &patch).unwrap();
            prop_assert_eq!(Checksum::of(&patched), Checksum::of(&after));
            prop_assert_eq!(patched, after);
        }

        #[test]
        fn test_in_order_delivery_converges(docs in edit_sequence(12)) {
            let mut pair = CachePair::new();
            for doc in docs {
                prop_assert!(pair.push(doc).is_ok());
                prop_assert!(pair.converged());
            }
        }

        #[test]
        fn test_writes_and_deletes_converge((key, steps) in write_delete_sequence(12)) {
            let mut pair = CachePair::new();
            for step in steps {
                match step {
                    Some(doc) => {
                        let existed = pair.producer.contains(&key);
                        let applied = pair.push(doc);
                        prop_assert!(applied.is_ok());
                        let expected = if existed { Command::Update } else { Command::New };
                        prop_assert_eq!(applied.unwrap().cmd, expected);
                    }
                    None if pair.producer.contains(&key) => {
                        prop_assert!(pair.remove(&key).is_ok());
                        prop_assert!(!pair.consumer.contains(&key));
                    }
                    None => {}
                }
                prop_assert!(pair.converged());
            }
        }

        #[test]
        fn test_retransmit_is_idempotent(docs in edit_sequence(6)) {
            let mut pair = CachePair::new();
            let key = EntryKey::from_value(&docs[0]["key"]).unwrap();
            for doc in docs {
                pair.push(doc).unwrap();
            }

            let first = pair.resync(&key).unwrap();
            let second = pair.resync(&key).unwrap();
            prop_assert_eq!(first.document, second.document);
            prop_assert!(pair.converged());
        }

        #[test]
        fn test_loss_is_repaired_by_retransmit(docs in edit_sequence(8), lost in 0usize..8) {
            let mut pair = CachePair::new();
            let key = EntryKey::from_value(&docs[0]["key"]).unwrap();
            let lost = lost % docs.len();

            for (i, doc) in docs.into_iter().enumerate() {
                if i == lost {
                    pair.drop_next(doc).unwrap();
                } else if pair.push(doc).is_err() {
                    pair.resync(&key).unwrap();
                }
            }
            if !pair.converged() {
                pair.resync(&key).unwrap();
            }
            prop_assert!(pair.converged());
        }

        #[test]
        fn test_checksum_fault_leaves_state_unchanged(
            docs in edit_sequence(4),
            extra in field_name(),
        ) {
            prop_assume!(extra != "key");
            let mut pair = CachePair::new();
            let key = EntryKey::from_value(&docs[0]["key"]).unwrap();
            for doc in docs {
                pair.push(doc).unwrap();
            }
            let before = pair.consumer.get(&key).cloned();

            let mut next = pair.producer.get(&key).unwrap().as_ref().clone();
            next[extra.as_str()] = Value::from("changed");
            let msg = pair.producer.update(next).unwrap();
            let tampered = DataMsg::upd_data(key.clone(), msg.patch().unwrap().clone(), Checksum::ZERO);

            let applied = pair.consumer.apply(&tampered);
            let is_mismatch = matches!(
                applied,
                Err(diffsync_cache::ApplyError::ChecksumMismatch { .. })
            );
            prop_assert!(is_mismatch);
            prop_assert_eq!(pair.consumer.get(&key).cloned(), before);
        }
    }
}
