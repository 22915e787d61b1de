//! The external metadata lookup boundary.
//!
//! Resolving an asset unit to a token id, fingerprint, and metadata blob is
//! HTTP territory owned by a collaborator; the projector only sees this
//! trait. Retry policy belongs to the implementation — the projector's own
//! defense is a timeout with a null-metadata fallback so a stalled lookup
//! never blocks ingestion.

use async_trait::async_trait;

use marketindex_core::IndexError;

/// Resolved display information for one asset unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    /// Token id (collection-local, e.g. a name or number).
    pub id: String,
    /// Asset fingerprint.
    pub fingerprint: String,
    /// Metadata blob; `Null` when unavailable.
    pub metadata: serde_json::Value,
    /// Signed access token for the image CDN.
    pub access_token: Option<String>,
}

impl TokenInfo {
    /// The placeholder used when a lookup fails or times out.
    pub fn null(unit: &str) -> Self {
        Self {
            id: unit.to_string(),
            fingerprint: unit.to_string(),
            metadata: serde_json::Value::Null,
            access_token: None,
        }
    }
}

/// Async lookup of asset display metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve `unit` (`policyId ++ assetName`). Failures are
    /// [`IndexError::Transient`] — the caller falls back, never aborts.
    async fn lookup(&self, unit: &str) -> Result<TokenInfo, IndexError>;
}

/// A source that always falls back. For tests and metadata-less deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetadata;

#[async_trait]
impl MetadataSource for NullMetadata {
    async fn lookup(&self, unit: &str) -> Result<TokenInfo, IndexError> {
        Ok(TokenInfo::null(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_source_echoes_the_unit() {
        let info = NullMetadata.lookup("policy1asset1").await.unwrap();
        assert_eq!(info.id, "policy1asset1");
        assert!(info.metadata.is_null());
        assert!(info.access_token.is_none());
    }
}
