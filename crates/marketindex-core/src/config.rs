//! Indexer configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::clock::SlotClock;
use crate::point::ChainPoint;

/// Configuration for the published activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Path of the published feed document.
    pub path: PathBuf,
    /// Maximum number of events retained across all buckets.
    pub max_events: usize,
    /// Optional external command run with the feed path after each publish
    /// (e.g. a gzip wrapper serving pre-compressed responses).
    pub compress_command: Option<String>,
    /// Budget for one metadata lookup before falling back to null metadata.
    pub lookup_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("feed/activity"),
            max_events: 1024,
            compress_command: None,
            lookup_timeout_ms: 5_000,
        }
    }
}

/// Configuration for an indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// SQLite database path.
    pub db_path: String,
    /// Point to initialize the checkpoint at on first start. `None` starts
    /// at the tip with the empty cleanup sentinel.
    pub start_point: Option<ChainPoint>,
    /// Slot distance behind the sync point before a pending event is safe
    /// to publish. Depth is measured in slots, not blocks — inter-block
    /// spacing is only approximately uniform. ~100 blocks.
    pub confirmation_depth: u64,
    /// Minimum slot distance between sync and cleanup points before settled
    /// rows are compacted. ~30 minutes, beyond realistic rollback depth.
    pub cleanup_margin: u64,
    /// Release depth-confirmed events every N producer messages.
    pub release_every: u64,
    /// Attempt a cleanup pass every N producer messages.
    pub cleanup_every: u64,
    /// Slot/wall-clock conversions.
    pub clock: SlotClock,
    pub feed: FeedConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: "./marketindex.db".into(),
            start_point: None,
            confirmation_depth: 2_000,
            cleanup_margin: 1_800,
            release_every: 20,
            cleanup_every: 500,
            clock: SlotClock::mainnet(),
            feed: FeedConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = IndexerConfig::default();
        assert!(cfg.confirmation_depth > cfg.cleanup_margin / 2);
        assert_eq!(cfg.feed.max_events, 1024);
        assert!(cfg.start_point.is_none());
    }
}
