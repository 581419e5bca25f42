//! Content checksums over full documents.
//!
//! The checksum validates the *result* of applying an update, never the
//! patch itself. It is a Blake3 digest of the compact JSON serialization of
//! the document. Object keys serialize in sorted order, so the same logical
//! document hashes identically in every process.

use serde_json::Value;
use std::fmt;

/// A 32-byte Blake3 digest of a full document.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Compute the checksum of a document.
    pub fn of(document: &Value) -> Self {
        Self(*blake3::hash(document.to_string().as_bytes()).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero checksum (never produced by a real document).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
