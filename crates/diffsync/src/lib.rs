//! # Diffsync
//!
//! Keyed JSON documents mirrored from one producer to many consumers by
//! broadcasting structural diffs instead of full snapshots.
//!
//! ## Overview
//!
//! - **Producer**: holds the authoritative document per key and turns each
//!   full write into `NEW`, `UPDATE` (patch plus checksum) or `DELETE`.
//! - **Consumer**: rebuilds the same documents by applying envelopes in
//!   order, verifying every patch against the producer's checksum.
//! - **Repair**: a consumer that detects divergence asks for the key over a
//!   request/response channel and receives a full `RETRAN` on its private
//!   topic.
//!
//! ## Key Concepts
//!
//! - **Checksum**: BLAKE3 over the canonical JSON text of the patched
//!   document. A mismatch means the mirror has diverged.
//! - **Desync fault**: unknown key, patch conflict or checksum mismatch.
//!   Each one is repaired by retransmission.
//! - **Requester id**: a consumer's identity and the topic its
//!   retransmissions arrive on.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use diffsync::stream::MemoryBus;
//! use diffsync::{EntryKey, NodeConfig, Publisher, Subscriber};
//! use serde_json::json;
//!
//! async fn example() -> diffsync::Result<()> {
//!     let bus = MemoryBus::new();
//!     let publisher = Publisher::new(
//!         bus.publisher(),
//!         bus.request_server().await?,
//!         NodeConfig::default(),
//!     );
//!     let mut subscriber = Subscriber::connect(
//!         bus.subscriber().await,
//!         bus.request_client(),
//!         NodeConfig::default(),
//!     )
//!     .await?;
//!
//!     publisher.update(json!({"key": 1, "a": 1, "b": 2})).await?;
//!     subscriber.poll(std::time::Duration::from_secs(1)).await?;
//!     assert!(subscriber.consumer().contains(&EntryKey::Int(1)));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `diffsync::core` - Envelopes, keys, checksums, codecs
//! - `diffsync::cache` - Producer and consumer caches
//! - `diffsync::stream` - Transport seams and the retransmission handshake

pub mod config;
pub mod error;
pub mod publisher;
pub mod stats;
pub mod subscriber;

// Re-export component crates
pub use diffsync_cache as cache;
pub use diffsync_core as core;
pub use diffsync_stream as stream;

// Re-export main types for convenience
pub use config::{NodeConfig, StatsConfig, DEFAULT_TOPIC};
pub use error::{DiffSyncError, Result};
pub use publisher::Publisher;
pub use stats::{StatsSnapshot, UtilizationStats};
pub use subscriber::{Outcome, Subscriber};

// Re-export commonly used types
pub use diffsync_cache::{
    ApplyError, CacheConfig, ChecksumPolicy, ConsumerCache, CopyMode, ProducerCache,
    ProducerError,
};
pub use diffsync_core::{Checksum, Codec, Command, DataMsg, Document, EntryKey};
