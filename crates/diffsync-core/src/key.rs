//! Entry keys.
//!
//! A key is a caller-supplied scalar pulled out of a designated document
//! field. Numbers and strings are both accepted; they never compare equal
//! to each other (`1` and `"1"` are distinct keys).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Key identifying one document within a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryKey {
    /// Integer key.
    Int(i64),
    /// String key.
    Text(String),
}

impl EntryKey {
    /// Extract a key from a JSON scalar.
    ///
    /// Returns `None` for non-integral numbers and non-scalar values.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntryKey::Int),
            Value::String(s) => Some(EntryKey::Text(s.clone())),
            _ => None,
        }
    }

    /// The key as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            EntryKey::Int(n) => Value::from(*n),
            EntryKey::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Candidate keys for a string received on a text-only channel.
    ///
    /// The text spelling comes first; a decimal integer follows if the
    /// string parses as one.
    pub fn candidates(raw: &str) -> Vec<EntryKey> {
        let mut keys = vec![EntryKey::Text(raw.to_string())];
        if let Ok(n) = raw.parse::<i64>() {
            keys.push(EntryKey::Int(n));
        }
        keys
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Int(n) => write!(f, "{}", n),
            EntryKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntryKey {
    fn from(n: i64) -> Self {
        EntryKey::Int(n)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        EntryKey::Text(s.to_string())
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        EntryKey::Text(s)
    }
}
