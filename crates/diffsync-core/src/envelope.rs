//! The change envelope: one state transition for one key.
//!
//! | cmd      | payload         | checksum                     |
//! |----------|-----------------|------------------------------|
//! | `NEW`    | full document   | none                         |
//! | `UPDATE` | patch (old→new) | checksum of the new document |
//! | `DELETE` | none            | none                         |
//! | `RETRAN` | full document   | none                         |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use json_patch::Patch;

use crate::checksum::Checksum;
use crate::command::Command;
use crate::error::{ProtocolError, Result};
use crate::key::EntryKey;

/// A full document as held by a cache.
///
/// Documents are immutable once stored; sharing one is a reference count
/// bump, and `Arc::make_mut` on a shared handle clones rather than mutating
/// what the cache holds.
pub type Document = Arc<Value>;

/// Envelope payload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// No payload (`DELETE`).
    Empty,
    /// A full document (`NEW`, `RETRAN`).
    Document(Document),
    /// An ordered sequence of patch operations (`UPDATE`).
    Patch(Patch),
}

impl Payload {
    fn to_json_value(&self) -> Option<Value> {
        match self {
            Payload::Empty => None,
            Payload::Document(doc) => Some(Value::clone(doc)),
            Payload::Patch(patch) => serde_json::to_value(patch).ok(),
        }
    }
}

impl PartialEq for Payload {
    /// Value equality, independent of in-memory representation.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Empty, Payload::Empty) => true,
            (Payload::Document(a), Payload::Document(b)) => a == b,
            (Payload::Patch(_), Payload::Patch(_)) => {
                let (a, b) = (self.to_json_value(), other.to_json_value());
                a.is_some() && a == b
            }
            _ => false,
        }
    }
}

/// A change envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMsg {
    pub cmd: Command,
    pub key: EntryKey,
    pub payload: Payload,
    pub checksum: Option<Checksum>,
}

/// Outbound wire tuple, borrowing where it can.
#[derive(Serialize)]
struct WireOut<'a>(&'a str, &'a EntryKey, Cow<'a, Value>, Option<String>);

/// Inbound wire tuple.
#[derive(Deserialize)]
struct WireIn(String, EntryKey, Value, Option<String>);

impl DataMsg {
    /// `NEW` envelope carrying the full document.
    pub fn new_data(key: EntryKey, document: Document) -> Self {
        Self {
            cmd: Command::New,
            key,
            payload: Payload::Document(document),
            checksum: None,
        }
    }

    /// `UPDATE` envelope carrying a patch and the checksum of the result.
    pub fn upd_data(key: EntryKey, patch: Patch, checksum: Checksum) -> Self {
        Self {
            cmd: Command::Update,
            key,
            payload: Payload::Patch(patch),
            checksum: Some(checksum),
        }
    }

    /// `DELETE` envelope.
    pub fn del_data(key: EntryKey) -> Self {
        Self {
            cmd: Command::Delete,
            key,
            payload: Payload::Empty,
            checksum: None,
        }
    }

    /// `RETRAN` envelope carrying the full document.
    pub fn ret_data(key: EntryKey, document: Document) -> Self {
        Self {
            cmd: Command::Retran,
            key,
            payload: Payload::Document(document),
            checksum: None,
        }
    }

    /// The full document, for `NEW` and `RETRAN`.
    pub fn document(&self) -> Option<&Document> {
        match &self.payload {
            Payload::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// The patch, for `UPDATE`.
    pub fn patch(&self) -> Option<&Patch> {
        match &self.payload {
            Payload::Patch(patch) => Some(patch),
            _ => None,
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.wire_out()?).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse from the JSON wire form.
    pub fn from_json(s: &str) -> Result<Self> {
        let wire: WireIn = serde_json::from_str(s)?;
        Self::from_wire(wire)
    }

    /// Serialize to JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.to_json().map(String::into_bytes)
    }

    /// Parse from JSON bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let wire: WireIn = serde_json::from_slice(bytes)?;
        Self::from_wire(wire)
    }

    /// Serialize to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(&self.wire_out()?, &mut buf)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Parse from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let wire: WireIn =
            ciborium::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Self::from_wire(wire)
    }

    fn wire_out(&self) -> Result<WireOut<'_>> {
        let payload = match &self.payload {
            Payload::Empty => Cow::Owned(Value::Null),
            Payload::Document(doc) => Cow::Borrowed(doc.as_ref()),
            // Patches travel as a string nested inside the outer tuple.
            Payload::Patch(patch) => Cow::Owned(Value::String(
                serde_json::to_string(patch).map_err(|e| ProtocolError::Encode(e.to_string()))?,
            )),
        };
        Ok(WireOut(
            self.cmd.code(),
            &self.key,
            payload,
            self.checksum.map(|c| c.to_hex()),
        ))
    }

    fn from_wire(wire: WireIn) -> Result<Self> {
        let WireIn(code, key, payload, checksum) = wire;
        let cmd = Command::from_code(&code)?;

        let checksum = checksum
            .map(|hex| Checksum::from_hex(&hex))
            .transpose()
            .map_err(|e| ProtocolError::Decode(format!("checksum: {}", e)))?;

        let payload = match (cmd, payload) {
            (_, Value::Null) => Payload::Empty,
            (Command::Update, Value::String(s)) => Payload::Patch(serde_json::from_str(&s)?),
            (Command::Update, v @ Value::Array(_)) => Payload::Patch(serde_json::from_value(v)?),
            (Command::Update, _) => {
                return Err(ProtocolError::Decode("update payload is not a patch".into()))
            }
            (_, v) => Payload::Document(Arc::new(v)),
        };

        let msg = Self {
            cmd,
            key,
            payload,
            checksum,
        };
        msg.validate_shape()?;
        Ok(msg)
    }

    /// Check the payload/checksum shape against the command.
    ///
    /// Control commands carry no shape requirement; the consumer rejects
    /// them separately.
    pub fn validate_shape(&self) -> Result<()> {
        let ok = match self.cmd {
            Command::New | Command::Retran => {
                matches!(self.payload, Payload::Document(_)) && self.checksum.is_none()
            }
            Command::Update => matches!(self.payload, Payload::Patch(_)) && self.checksum.is_some(),
            Command::Delete => matches!(self.payload, Payload::Empty) && self.checksum.is_none(),
            Command::Ack | Command::Nack => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::Decode(format!(
                "payload does not match command {}",
                self.cmd
            )))
        }
    }
}

impl fmt::Display for DataMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match &self.payload {
            Payload::Empty => "None".to_string(),
            Payload::Document(doc) => doc.to_string(),
            Payload::Patch(patch) => serde_json::to_string(patch).unwrap_or_default(),
        };
        let head: String = data.chars().take(40).collect();
        let ellipsis = if head.len() < data.len() { "..." } else { "" };
        write!(
            f,
            "DataMsg cmd:{} key:{} data:{}{}",
            self.cmd, self.key, head, ellipsis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        Arc::new(v)
    }

    fn sample_update() -> DataMsg {
        let old = json!({"a": 1, "b": 2, "key": 314159});
        let new = json!({"a": 2, "b": 2, "key": 314159});
        let patch = json_patch::diff(&old, &new);
        DataMsg::upd_data(EntryKey::Int(314159), patch, Checksum::of(&new))
    }

    #[test]
    fn test_json_roundtrip_all_kinds() {
        let key = EntryKey::Int(314159);
        let body = doc(json!({"a": 1, "b": 2, "key": 314159}));
        let msgs = vec![
            DataMsg::new_data(key.clone(), body.clone()),
            sample_update(),
            DataMsg::del_data(key.clone()),
            DataMsg::ret_data(key, body),
        ];
        for msg in msgs {
            let decoded = DataMsg::from_json(&msg.to_json().unwrap()).unwrap();
            assert_eq!(msg, decoded, "roundtrip failed for {}", msg.cmd);
        }
    }

    #[test]
    fn test_cbor_roundtrip_update() {
        let msg = sample_update();
        let decoded = DataMsg::from_cbor(&msg.to_cbor().unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_update_payload_is_nested_string() {
        let msg = sample_update();
        let outer: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(outer[0], json!("u"));
        assert!(outer[2].is_string());
        assert_eq!(outer[3], json!(msg.checksum.unwrap().to_hex()));
    }

    #[test]
    fn test_wire_shape_new() {
        let msg = DataMsg::new_data(EntryKey::from("k"), doc(json!({"key": "k"})));
        assert_eq!(msg.to_json().unwrap(), r#"["n","k",{"key":"k"},null]"#);
    }

    #[test]
    fn test_inequality_on_key() {
        let body = doc(json!({"a": 1, "key": 314159}));
        let a = DataMsg::new_data(EntryKey::Int(314159), body.clone());
        let mut b = DataMsg::from_json(&a.to_json().unwrap()).unwrap();
        b.key = EntryKey::Int(314);
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            DataMsg::decode(b"not json"),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            DataMsg::from_json(r#"["n", 1]"#),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            DataMsg::from_json(r#"["z", 1, null, null]"#),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            DataMsg::from_json(r#"["u", 1, {"a": 1}, null]"#),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            DataMsg::from_json(r#"["u", 1, "[]", "zz"]"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_update_without_checksum() {
        assert!(DataMsg::from_json(r#"["u", 1, "[]", null]"#).is_err());
    }

    #[test]
    fn test_control_command_decodes() {
        let msg = DataMsg::from_json(r#"["a", 1, null, null]"#).unwrap();
        assert_eq!(msg.cmd, Command::Ack);
    }

    #[test]
    fn test_display() {
        let msg = DataMsg::new_data(EntryKey::Int(314), doc(json!({"a": 1, "b": 2, "key": 314})));
        assert_eq!(
            msg.to_string(),
            r#"DataMsg cmd:NEW key:314 data:{"a":1,"b":2,"key":314}"#
        );

        let long = DataMsg::new_data(EntryKey::Int(1), doc(json!({"text": "x".repeat(80)})));
        assert!(long.to_string().ends_with("..."));
    }
}
