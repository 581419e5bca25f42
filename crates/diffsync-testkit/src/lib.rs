//! # Diffsync Testkit
//!
//! Testing utilities for diffsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for documents, edit sequences and envelopes
//! - **Fixtures**: A producer wired to a consumer, and a fake auction feed
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use diffsync_testkit::{generators::edit_sequence, CachePair};
//!
//! proptest! {
//!     #[test]
//!     fn mirrors_converge(docs in edit_sequence(10)) {
//!         let mut pair = CachePair::new();
//!         for doc in docs {
//!             pair.push(doc).unwrap();
//!         }
//!         prop_assert!(pair.converged());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use diffsync_testkit::{AuctionGenerator, CachePair};
//!
//! let mut pair = CachePair::new();
//! for doc in AuctionGenerator::new(42).take(10) {
//!     pair.push(doc).unwrap();
//! }
//! assert!(pair.converged());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{AuctionGenerator, CachePair, PairError};
pub use generators::{data_msg, document, edit_sequence, entry_key, write_delete_sequence};
