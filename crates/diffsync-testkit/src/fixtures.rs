//! Test fixtures and helpers.
//!
//! Common setup code for cache-level and node-level tests.

use diffsync_cache::{
    Applied, ApplyError, CacheConfig, ConsumerCache, ProducerCache, ProducerError,
};
use diffsync_core::{DataMsg, Document, EntryKey};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Failure while pushing a document through a [`CachePair`].
#[derive(Debug)]
pub enum PairError {
    Producer(ProducerError),
    Apply(ApplyError),
}

impl From<ProducerError> for PairError {
    fn from(e: ProducerError) -> Self {
        PairError::Producer(e)
    }
}

impl From<ApplyError> for PairError {
    fn from(e: ApplyError) -> Self {
        PairError::Apply(e)
    }
}

/// A producer wired straight to a consumer, with no transport between.
#[derive(Debug)]
pub struct CachePair {
    pub producer: ProducerCache,
    pub consumer: ConsumerCache,
}

impl CachePair {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Both caches share `config`.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            producer: ProducerCache::new(config.clone()),
            consumer: ConsumerCache::new(config),
        }
    }

    /// Write `document` and deliver the envelope.
    pub fn push(&mut self, document: impl Into<Document>) -> Result<Applied, PairError> {
        let msg = self.producer.update(document)?;
        Ok(self.consumer.apply(&msg)?)
    }

    /// Write `document` but lose the envelope.
    pub fn drop_next(&mut self, document: impl Into<Document>) -> Result<DataMsg, PairError> {
        Ok(self.producer.update(document)?)
    }

    /// Delete `key` and deliver the envelope.
    pub fn remove(&mut self, key: &EntryKey) -> Result<Applied, PairError> {
        let msg = self.producer.delete(key)?;
        Ok(self.consumer.apply(&msg)?)
    }

    /// Retransmit `key` to the consumer.
    pub fn resync(&mut self, key: &EntryKey) -> Result<Applied, PairError> {
        let msg = self.producer.retransmit(key)?;
        Ok(self.consumer.apply(&msg)?)
    }

    /// Whether both sides hold the same keys with equal documents.
    pub fn converged(&self) -> bool {
        self.producer.len() == self.consumer.len()
            && self
                .producer
                .keys()
                .all(|key| self.producer.get(key) == self.consumer.get(key))
    }
}

impl Default for CachePair {
    fn default() -> Self {
        Self::new()
    }
}

const USER_NAMES: &[&str] = &[
    "Alice", "Bob", "Charles", "Dana", "Eric", "Felix", "Gina", "Helen", "Ina", "Josie", "Kenny",
    "Lars", "Michelle", "Nicholas", "Oscar", "Pepper",
];

const TITLES: &[&str] = &[
    "Super Duper Space Monkey",
    "Antique Bobble Wheel",
    "One-of-a-kind Dinglewobber",
    "Singularity Point Projector",
    "Yesterdays Must-Have-Thing",
    "Somebody elses idea of fun",
];

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipisicing elit, sed do \
eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim \
veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea \
commodo consequat. Duis aute irure dolor in reprehenderit in voluptate velit \
esse cillum dolore eu fugiat nulla pariatur. Excepteur sint occaecat cupidatat \
non proident, sunt in culpa qui officia deserunt mollit anim id est laborum";

/// Endless stream of bids on one fake auction.
///
/// The first document has no bid; each following one raises the price.
/// Only `last_bid` changes, so successive updates make small diffs.
pub struct AuctionGenerator {
    rng: StdRng,
    current: Value,
    tick: u64,
    started: bool,
}

impl AuctionGenerator {
    /// Deterministic generator.
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let key: [u8; 16] = rng.gen();
        let title = TITLES.choose(&mut rng).copied().unwrap_or_default();
        let from = rng.gen_range(0..=LOREM.len() / 2);
        let to = rng.gen_range(from..=LOREM.len());

        let current = json!({
            "key": hex::encode(key),
            "title": title,
            "description": &LOREM[from..to],
            "last_bid": {"user": null, "price": 0, "time": null},
        });

        Self {
            rng,
            current,
            tick: 0,
            started: false,
        }
    }

    /// Key of the auction.
    pub fn key(&self) -> EntryKey {
        EntryKey::from_value(&self.current["key"]).unwrap_or_else(|| EntryKey::from(""))
    }

    fn bid(&mut self) {
        self.tick += 1;
        let price = self.current["last_bid"]["price"].as_i64().unwrap_or(0)
            + self.rng.gen_range(1..=10);
        let user = USER_NAMES.choose(&mut self.rng).copied().unwrap_or_default();
        self.current["last_bid"] = json!({"user": user, "price": price, "time": self.tick});
    }
}

impl Iterator for AuctionGenerator {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.started {
            self.bid();
        }
        self.started = true;
        Some(self.current.clone())
    }
}
