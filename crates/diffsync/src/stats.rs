//! Bandwidth and message accounting for a publisher.

use std::collections::{HashMap, HashSet};

use diffsync_core::{Command, EntryKey};
use serde_json::Value;

use crate::config::StatsConfig;

/// Running totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub num_messages: u64,
    /// Bytes of the envelopes actually sent.
    pub bytes_transmitted: u64,
    /// Bytes the full documents would have cost.
    pub bytes_original: u64,
    pub message_types: HashMap<Command, u64>,
    pub unique_keys: HashSet<EntryKey>,
}

impl StatsSnapshot {
    /// Sent bytes over full-document bytes, if any bytes were tracked.
    pub fn compression_ratio(&self) -> Option<f64> {
        (self.bytes_original > 0)
            .then(|| self.bytes_transmitted as f64 / self.bytes_original as f64)
    }
}

/// Utilization statistics with optional periodic snapshots.
#[derive(Debug, Clone, Default)]
pub struct UtilizationStats {
    config: StatsConfig,
    current: StatsSnapshot,
    reports: Vec<StatsSnapshot>,
}

impl UtilizationStats {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            current: StatsSnapshot::default(),
            reports: Vec::new(),
        }
    }

    /// Account for one transmitted envelope.
    ///
    /// `original` is the full document the envelope stands for, when there
    /// is one.
    pub fn transmitted(
        &mut self,
        bytes_sent: usize,
        original: Option<&Value>,
        cmd: Command,
        key: &EntryKey,
    ) {
        self.current.num_messages += 1;

        if self.config.track_bytes {
            self.current.bytes_transmitted += bytes_sent as u64;
            self.current.bytes_original += original.map_or(0, |doc| doc.to_string().len() as u64);
        }
        if self.config.track_messages {
            *self.current.message_types.entry(cmd).or_insert(0) += 1;
        }
        if self.config.track_keys {
            self.current.unique_keys.insert(key.clone());
        }

        if let Some(interval) = self.config.report_interval {
            if interval > 0 && self.current.num_messages % interval == 0 {
                self.reports.push(self.current.clone());
            }
        }
    }

    /// Totals so far.
    pub fn current(&self) -> &StatsSnapshot {
        &self.current
    }

    /// Snapshots taken every `report_interval` messages.
    pub fn report(&self) -> &[StatsSnapshot] {
        &self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_nothing() {
        let mut stats = UtilizationStats::default();
        stats.transmitted(123, Some(&json!("Something")), Command::New, &EntryKey::Int(1));

        let current = stats.current();
        assert_eq!(current.num_messages, 1);
        assert_eq!(current.bytes_transmitted, 0);
        assert_eq!(current.bytes_original, 0);
        assert!(current.message_types.is_empty());
        assert!(current.unique_keys.is_empty());
        assert!(stats.report().is_empty());
    }

    #[test]
    fn test_bytes() {
        let mut stats = UtilizationStats::new(StatsConfig {
            track_bytes: true,
            ..Default::default()
        });
        let data = json!({"a": 1, "b": "Hello"});
        stats.transmitted(123, Some(&data), Command::New, &EntryKey::Int(1));
        stats.transmitted(234, Some(&data), Command::Update, &EntryKey::Int(1));
        stats.transmitted(10, None, Command::Delete, &EntryKey::Int(1));

        let current = stats.current();
        assert_eq!(current.bytes_transmitted, 123 + 234 + 10);
        assert_eq!(current.bytes_original, 2 * data.to_string().len() as u64);
        assert!(current.compression_ratio().is_some());
    }

    #[test]
    fn test_messages() {
        let mut stats = UtilizationStats::new(StatsConfig {
            track_messages: true,
            ..Default::default()
        });
        stats.transmitted(0, None, Command::Update, &EntryKey::Int(1));
        stats.transmitted(0, None, Command::Update, &EntryKey::Int(1));

        assert_eq!(stats.current().num_messages, 2);
        assert_eq!(stats.current().message_types.get(&Command::Update), Some(&2));
        assert_eq!(stats.current().message_types.len(), 1);
    }

    #[test]
    fn test_keys() {
        let mut stats = UtilizationStats::new(StatsConfig {
            track_keys: true,
            ..Default::default()
        });
        stats.transmitted(0, None, Command::New, &EntryKey::Int(314159));
        stats.transmitted(0, None, Command::Update, &EntryKey::Int(314159));
        stats.transmitted(0, None, Command::New, &EntryKey::Int(271828));
        assert_eq!(stats.current().unique_keys.len(), 2);
    }

    #[test]
    fn test_report_interval() {
        let mut stats = UtilizationStats::new(StatsConfig {
            report_interval: Some(2),
            ..StatsConfig::all()
        });
        for i in 0..5 {
            stats.transmitted(1, None, Command::New, &EntryKey::Int(i));
        }

        let report = stats.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].num_messages, 2);
        assert_eq!(report[1].num_messages, 4);
        assert_eq!(report[1].unique_keys.len(), 4);
    }
}
