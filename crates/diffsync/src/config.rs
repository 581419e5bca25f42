//! Node configuration.

use diffsync_cache::CacheConfig;
use diffsync_core::Codec;
use diffsync_stream::RetransmitConfig;

/// Topic carrying the shared change stream.
pub const DEFAULT_TOPIC: &str = "_ATOP_";

/// Configuration shared by publishers and subscribers.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Shared broadcast topic.
    pub topic: String,
    /// Cache behavior.
    pub cache: CacheConfig,
    /// Retransmission request behavior.
    pub retransmit: RetransmitConfig,
    /// Envelope codec. Both ends must agree.
    pub codec: Codec,
    /// Which utilization figures the publisher tracks.
    pub stats: StatsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_owned(),
            cache: CacheConfig::default(),
            retransmit: RetransmitConfig::default(),
            codec: Codec::default(),
            stats: StatsConfig::default(),
        }
    }
}

/// Utilization tracking switches. Message counts are always kept.
#[derive(Debug, Clone, Default)]
pub struct StatsConfig {
    /// Track bytes sent against bytes of the full documents.
    pub track_bytes: bool,
    /// Track messages per command.
    pub track_messages: bool,
    /// Track the set of keys seen.
    pub track_keys: bool,
    /// Take a snapshot every this many messages.
    pub report_interval: Option<u64>,
}

impl StatsConfig {
    /// Track everything, without periodic snapshots.
    pub fn all() -> Self {
        Self {
            track_bytes: true,
            track_messages: true,
            track_keys: true,
            report_interval: None,
        }
    }
}
