//! Asset bundles, open-bid constraints, and the opaque fallback for
//! loosely-typed stored JSON.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─── AssetBundle ──────────────────────────────────────────────────────────────

/// A bundle of on-chain assets: `policyId ++ assetName → quantity`.
///
/// NFTs carry quantity 1; semi-fungibles may carry more. Stored as a JSON
/// object in TEXT columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetBundle(pub BTreeMap<String, u64>);

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bundle holding a single unit.
    pub fn single(unit: impl Into<String>, quantity: u64) -> Self {
        let mut map = BTreeMap::new();
        map.insert(unit.into(), quantity);
        Self(map)
    }

    pub fn insert(&mut self, unit: impl Into<String>, quantity: u64) {
        self.0.insert(unit.into(), quantity);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First unit in canonical (sorted) order — the display asset.
    pub fn first_unit(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }
}

impl FromIterator<(String, u64)> for AssetBundle {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ─── BidConstraints ───────────────────────────────────────────────────────────

/// Structural constraints attached to an open bid, e.g.
/// `{"types": ["Lion"], "traits": ["Axe", "Jo-Jo"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidConstraints {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub traits: Vec<String>,
}

// ─── MaybeParsed ──────────────────────────────────────────────────────────────

/// A value read from a loosely-typed TEXT column.
///
/// Validation happens at the store boundary: text that parses into `T` comes
/// back as `Parsed`, anything else is kept verbatim as `Raw`. This keeps
/// "invalid" distinguishable from "absent" — an unparseable row is surfaced,
/// not dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum MaybeParsed<T> {
    Parsed(T),
    Raw(String),
}

impl<T: DeserializeOwned> MaybeParsed<T> {
    /// Parse `text` as JSON, falling back to the raw text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Self::Parsed(value),
            Err(_) => Self::Raw(text.to_string()),
        }
    }
}

impl<T> MaybeParsed<T> {
    pub fn as_parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_json_roundtrip() {
        let mut bundle = AssetBundle::new();
        bundle.insert("policy1asset1", 1);
        bundle.insert("policy1asset2", 5);
        let json = serde_json::to_string(&bundle).unwrap();
        let back: AssetBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
        assert_eq!(back.first_unit(), Some("policy1asset1"));
    }

    #[test]
    fn constraints_parse_with_missing_fields() {
        let parsed = MaybeParsed::<BidConstraints>::parse(r#"{"types": ["Lion"]}"#);
        let constraints = parsed.as_parsed().unwrap();
        assert_eq!(constraints.types, vec!["Lion"]);
        assert!(constraints.traits.is_empty());
    }

    #[test]
    fn invalid_json_falls_back_to_raw() {
        let parsed = MaybeParsed::<BidConstraints>::parse("not json at all");
        assert!(parsed.is_raw());
        assert!(parsed.as_parsed().is_none());
    }
}
