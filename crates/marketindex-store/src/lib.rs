//! marketindex-store — the durable, reorg-aware side of the indexer.
//!
//! One [`MarketStore`] owns five tables (listings, bids, sales,
//! cancellations, pending events), a singleton two-pointer checkpoint, and a
//! read-only `activity` view. Every producer message mutates it inside one
//! transaction; [`MarketStore::rollback_to`] rewinds all of it to an
//! ancestor point, and [`MarketStore::release_confirmed`] drains
//! depth-confirmed pending events exactly once.

pub mod sqlite;

pub use sqlite::MarketStore;
