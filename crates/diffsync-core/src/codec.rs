//! Envelope codecs.

use crate::envelope::DataMsg;
use crate::error::Result;

/// Byte encoding used for change envelopes on the wire.
///
/// Both codecs carry the same ordered 4-tuple; only the framing of values
/// differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    /// Compact JSON text.
    #[default]
    Json,
    /// CBOR (RFC 8949).
    Cbor,
}

impl Codec {
    /// Encode an envelope.
    pub fn encode(&self, msg: &DataMsg) -> Result<Vec<u8>> {
        match self {
            Codec::Json => msg.encode(),
            Codec::Cbor => msg.to_cbor(),
        }
    }

    /// Decode an envelope.
    pub fn decode(&self, bytes: &[u8]) -> Result<DataMsg> {
        match self {
            Codec::Json => DataMsg::decode(bytes),
            Codec::Cbor => DataMsg::from_cbor(bytes),
        }
    }
}
