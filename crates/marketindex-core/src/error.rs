//! Error types for the marketplace indexing pipeline.

use thiserror::Error;

/// Errors that can occur while indexing marketplace activity.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Duplicate primary key on insert — producer and indexer are out of
    /// sync. Logged and skipped, never silently merged.
    #[error("duplicate {kind} at reference {reference}")]
    Conflict {
        kind: &'static str,
        reference: String,
    },

    /// Spend of a reference the store has never seen. Legitimate when the
    /// output predates the indexer's start point.
    #[error("unknown reference {0}")]
    NotFound(String),

    /// The cleanup checkpoint is ahead of a rollback target. The safety
    /// margin should make this unreachable; past this point correctness
    /// cannot be guaranteed and processing must stop.
    #[error(
        "cleanup point at slot {cleanup_slot} is ahead of rollback target slot {target_slot}"
    )]
    Consistency { cleanup_slot: u64, target_slot: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("codec error: {0}")]
    Codec(String),

    /// Recoverable I/O failure at an external boundary (metadata lookup).
    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("feed error: {0}")]
    Feed(String),
}

impl IndexError {
    /// Returns `true` for errors that must halt ingestion.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }

    /// Returns `true` if the error is a duplicate-insert conflict
    /// (the enclosing message can be skipped).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        let consistency = IndexError::Consistency {
            cleanup_slot: 500,
            target_slot: 400,
        };
        assert!(consistency.is_fatal());
        assert!(!consistency.is_conflict());

        let conflict = IndexError::Conflict {
            kind: "listing",
            reference: "abc0".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_fatal());
    }
}
