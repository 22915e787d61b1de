//! marketindex-core — foundation for the reorg-aware marketplace indexer.
//!
//! # Architecture
//!
//! ```text
//! Producer → Ingestor
//!               ├── MarketStore      (listings, bids, sales, cancellations,
//!               │                     pending events, two-pointer checkpoint)
//!               ├── rollback_to      (reorg reconciliation, one transaction)
//!               ├── release_confirmed (depth-confirmed pending events)
//!               └── FeedProjector    (bounded epoch/timestamp feed, a cache)
//! ```
//!
//! This crate holds the shared vocabulary: chain points, output references,
//! the closed marketplace event set, the storage-key codec, errors, the slot
//! clock, and configuration. Storage, feed projection, and the ingestion loop
//! live in their own crates.

pub mod asset;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod point;
pub mod record;

pub use asset::{AssetBundle, BidConstraints, MaybeParsed};
pub use clock::SlotClock;
pub use config::{FeedConfig, IndexerConfig};
pub use error::IndexError;
pub use event::{
    BidEvent, BidKind, CancelKind, CancellationEvent, EventKind, EventSummary, ListingEvent,
    ListingKind, MarketEvent, SaleEvent, SaleKind, SpendTarget,
};
pub use point::{ChainPoint, OutputRef};
pub use record::{
    ActivityRow, BidRecord, CancellationRecord, Checkpoint, ListingRecord, PendingEvent,
    SaleRecord,
};
