//! marketindex-feed — the externally published activity feed.
//!
//! A cache, never a source of truth: confirmed pending events are folded
//! into a two-level bucket document (epoch → timestamp → display events),
//! bounded by total event count, and published with an isolated-build-then-
//! atomic-swap so readers never see a partial write. Rollbacks purge the
//! affected buckets; if the process dies in between, startup recovery
//! re-trims from the durable store checkpoint.

pub mod bucket;
pub mod metadata;
pub mod projector;
pub mod writer;

pub use bucket::{FeedDocument, FeedEntry};
pub use metadata::{MetadataSource, NullMetadata, TokenInfo};
pub use projector::FeedProjector;
pub use writer::FeedWriter;
