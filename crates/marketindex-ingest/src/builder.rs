//! Fluent builder for [`IndexerConfig`].
//!
//! # Example
//!
//! ```rust
//! use marketindex_ingest::IndexerBuilder;
//! use marketindex_core::ChainPoint;
//!
//! let config = IndexerBuilder::new()
//!     .db_path("./marketindex.db")
//!     .start_point(ChainPoint::new(87_848_215, "8d".repeat(32)))
//!     .confirmation_depth(2_000)
//!     .feed_path("feed/activity")
//!     .build_config();
//! ```

use std::path::PathBuf;

use marketindex_core::{ChainPoint, IndexerConfig, SlotClock};

/// Fluent builder for `IndexerConfig`.
#[derive(Debug, Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the SQLite database path.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the point to initialize the checkpoint at on first start.
    pub fn start_point(mut self, point: ChainPoint) -> Self {
        self.config.start_point = Some(point);
        self
    }

    /// Set the confirmation depth in slots.
    pub fn confirmation_depth(mut self, slots: u64) -> Self {
        self.config.confirmation_depth = slots;
        self
    }

    /// Set the cleanup safety margin in slots.
    pub fn cleanup_margin(mut self, slots: u64) -> Self {
        self.config.cleanup_margin = slots;
        self
    }

    /// Release confirmed events every N producer messages.
    pub fn release_every(mut self, messages: u64) -> Self {
        self.config.release_every = messages;
        self
    }

    /// Attempt a cleanup pass every N producer messages.
    pub fn cleanup_every(mut self, messages: u64) -> Self {
        self.config.cleanup_every = messages;
        self
    }

    /// Set the published feed path.
    pub fn feed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.feed.path = path.into();
        self
    }

    /// Set the maximum retained feed event count.
    pub fn feed_max_events(mut self, max: usize) -> Self {
        self.config.feed.max_events = max;
        self
    }

    /// Set the external compression hook run after each publish.
    pub fn compress_command(mut self, command: impl Into<String>) -> Self {
        self.config.feed.compress_command = Some(command.into());
        self
    }

    /// Set the metadata lookup timeout in milliseconds.
    pub fn lookup_timeout_ms(mut self, ms: u64) -> Self {
        self.config.feed.lookup_timeout_ms = ms;
        self
    }

    /// Set the slot clock (defaults to mainnet constants).
    pub fn clock(mut self, clock: SlotClock) -> Self {
        self.config.clock = clock;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
