//! # Diffsync Core
//!
//! Pure vocabulary shared by producers and consumers of a diff stream:
//! commands, entry keys, checksums, and the change envelope.
//!
//! This crate contains no I/O, no caching, no networking. It describes what
//! crosses the wire and how it is encoded.
//!
//! ## Key Types
//!
//! - [`DataMsg`] - One state transition for one key (the change envelope)
//! - [`Command`] - Shared command vocabulary for data and control messages
//! - [`EntryKey`] - The key identifying a document within a cache
//! - [`Checksum`] - Content hash of a full document
//! - [`Codec`] - Text (JSON) or binary (CBOR) encoding of an envelope
//!
//! ## Wire Format
//!
//! Every envelope is an ordered 4-tuple `[cmd, key, payload, checksum]`.
//! For `UPDATE` the payload is the patch serialized as a JSON string nested
//! inside the outer tuple.

pub mod checksum;
pub mod codec;
pub mod command;
pub mod envelope;
pub mod error;
pub mod key;

pub use checksum::Checksum;
pub use codec::Codec;
pub use command::Command;
pub use envelope::{DataMsg, Document, Payload};
pub use error::{ProtocolError, Result};
pub use key::EntryKey;

/// Re-exported patch types so downstream crates agree on one definition.
pub use json_patch::{Patch, PatchOperation};
