//! Chain positions and output references — the keys every rollback decision
//! hangs off.

use serde::{Deserialize, Serialize};

// ─── ChainPoint ───────────────────────────────────────────────────────────────

/// A position on the chain: slot number plus block header hash.
///
/// Points are totally ordered by slot; equality is on the pair. The
/// pre-genesis point (Origin) carries an empty hash and slot 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainPoint {
    /// Monotonically increasing position on the chain's time axis.
    pub slot: u64,
    /// Block header hash (64 lowercase hex chars; empty for Origin).
    pub hash: String,
}

impl ChainPoint {
    pub fn new(slot: u64, hash: impl Into<String>) -> Self {
        Self {
            slot,
            hash: hash.into(),
        }
    }

    /// The pre-genesis point.
    pub fn origin() -> Self {
        Self {
            slot: 0,
            hash: String::new(),
        }
    }

    /// Returns `true` if this is the empty sentinel.
    ///
    /// A hash of `"0"` also counts — a checkpoint initialized before any
    /// block was seen round-trips through storage as `"0"`.
    pub fn is_origin(&self) -> bool {
        self.hash.is_empty() || self.hash == "0"
    }
}

impl std::fmt::Display for ChainPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_origin() {
            write!(f, "origin")
        } else {
            write!(f, "{}@{}", &self.hash[..self.hash.len().min(8)], self.slot)
        }
    }
}

// ─── OutputRef ────────────────────────────────────────────────────────────────

/// A UTxO reference: (transaction hash, output index).
///
/// Stable and never reused — the unique key for listings and bids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Transaction hash (64 lowercase hex chars).
    pub tx_hash: String,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl OutputRef {
    pub fn new(tx_hash: impl Into<String>, index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            index,
        }
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
