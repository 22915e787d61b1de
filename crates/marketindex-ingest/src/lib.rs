//! marketindex-ingest — the single-writer ingestion side.
//!
//! A [`Producer`] delivers ordered apply/rollback messages; the [`Ingestor`]
//! processes them strictly in order on one task, applying each message in
//! one store transaction, reconciling rollbacks through the store and the
//! feed, and periodically releasing depth-confirmed events and compacting
//! settled history.

pub mod builder;
pub mod ingest_loop;
pub mod producer;

pub use builder::IndexerBuilder;
pub use ingest_loop::Ingestor;
pub use producer::{ChainMessage, Producer, ScriptProducer, StreamProducer};
