//! # Diffsync Cache
//!
//! The two halves of a diff stream: a [`ProducerCache`] holding the
//! authoritative full documents and a [`ConsumerCache`] holding a mirror
//! rebuilt purely from change envelopes.
//!
//! ## Overview
//!
//! The producer turns full-state writes into minimal change envelopes. The
//! consumer applies them in arrival order and verifies every update against
//! the checksum the producer computed. When verification fails, the consumer
//! reports a desync fault and the caller asks for a retransmission.
//!
//! Neither cache performs I/O or locking. The producer assumes a single
//! writer; wrap it in a mutex when a responder task reads it concurrently.
//!
//! ## Usage
//!
//! ```rust
//! use diffsync_cache::{CacheConfig, ConsumerCache, ProducerCache};
//! use serde_json::json;
//!
//! let mut producer = ProducerCache::new(CacheConfig::default());
//! let mut consumer = ConsumerCache::new(CacheConfig::default());
//!
//! let msg = producer.update(json!({"key": 1, "a": 1, "b": 2})).unwrap();
//! consumer.apply(&msg).unwrap();
//!
//! let msg = producer.update(json!({"key": 1, "a": 3, "b": 2})).unwrap();
//! let applied = consumer.apply(&msg).unwrap();
//! assert_eq!(applied.document.unwrap()["a"], 3);
//! ```
//!
//! ## Design Notes
//!
//! - **Verify before adopt**: an update whose result fails the checksum is
//!   discarded; what happens to the old value is a [`ChecksumPolicy`].
//! - **Copy on store**: [`CopyMode`] decides whether a cache stores its own
//!   copy of each document or shares the caller's handle.
//! - **Faults are values**: every failure is an [`ApplyError`] or
//!   [`ProducerError`] variant; none unwinds.

pub mod config;
pub mod consumer;
pub mod error;
pub mod producer;

pub use config::{CacheConfig, ChecksumPolicy, CopyMode, DEFAULT_KEY_FIELD};
pub use consumer::{Applied, ConsumerCache};
pub use error::{ApplyError, ProducerError, Result};
pub use producer::ProducerCache;
