//! The two-level feed document: epoch → timestamp → display events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One externally visible display event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Feed action: `list`, `bid`, `sold`, `unlist`, `unbid`.
    pub kind: String,
    /// Token id resolved by the metadata source.
    pub token: String,
    /// Price in lovelace.
    pub value: u64,
    /// Asset fingerprint.
    pub fingerprint: String,
    /// Counterparty address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Metadata blob (null when the lookup fell back).
    pub metadata: serde_json::Value,
    /// Access token for the image CDN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tk: Option<String>,
}

/// The published feed: epoch → timestamp → arrival-ordered events.
///
/// Integer keys serialize as JSON object keys (strings); both levels stay
/// sorted so newest-first walks are cheap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedDocument(pub BTreeMap<u64, BTreeMap<i64, Vec<FeedEntry>>>);

impl FeedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to its bucket, preserving arrival order.
    pub fn push(&mut self, epoch: u64, timestamp: i64, entry: FeedEntry) {
        self.0
            .entry(epoch)
            .or_default()
            .entry(timestamp)
            .or_default()
            .push(entry);
    }

    pub fn total_events(&self) -> usize {
        self.0
            .values()
            .flat_map(|buckets| buckets.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk buckets newest→oldest, keeping whole buckets until the running
    /// count crosses `max_events`; everything older is discarded. The
    /// crossing bucket is kept intact, so the bound is approximate at
    /// bucket granularity.
    pub fn retain_newest(&mut self, max_events: usize) {
        let mut kept = 0usize;
        let mut retained: BTreeMap<u64, BTreeMap<i64, Vec<FeedEntry>>> = BTreeMap::new();
        'outer: for (&epoch, buckets) in self.0.iter().rev() {
            for (&timestamp, events) in buckets.iter().rev() {
                retained
                    .entry(epoch)
                    .or_default()
                    .insert(timestamp, events.clone());
                kept += events.len();
                if kept > max_events {
                    break 'outer;
                }
            }
        }
        self.0 = retained;
    }

    /// Remove every bucket with timestamp at or past `cutoff`; epochs left
    /// empty disappear. Returns the number of events removed.
    pub fn purge_since(&mut self, cutoff: i64) -> usize {
        let mut removed = 0;
        for buckets in self.0.values_mut() {
            buckets.retain(|&timestamp, events| {
                if timestamp >= cutoff {
                    removed += events.len();
                    false
                } else {
                    true
                }
            });
        }
        self.0.retain(|_, buckets| !buckets.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str) -> FeedEntry {
        FeedEntry {
            kind: kind.into(),
            token: "token1".into(),
            value: 10_000_000,
            fingerprint: "asset1fingerprint".into(),
            addr: Some("addr1owner".into()),
            metadata: serde_json::Value::Null,
            tk: None,
        }
    }

    #[test]
    fn push_orders_and_counts() {
        let mut doc = FeedDocument::new();
        doc.push(209, 1_000, entry("list"));
        doc.push(209, 1_000, entry("sold"));
        doc.push(210, 2_000, entry("bid"));
        assert_eq!(doc.total_events(), 3);
        assert_eq!(doc.0[&209][&1_000][0].kind, "list");
        assert_eq!(doc.0[&209][&1_000][1].kind, "sold");
    }

    #[test]
    fn retain_keeps_newest_buckets_and_drops_emptied_epochs() {
        let mut doc = FeedDocument::new();
        // Three epochs, one bucket of two events each.
        for (epoch, timestamp) in [(209u64, 1_000i64), (210, 2_000), (211, 3_000)] {
            doc.push(epoch, timestamp, entry("list"));
            doc.push(epoch, timestamp, entry("bid"));
        }

        doc.retain_newest(3);

        // Newest bucket (2 events) + the crossing bucket (2 more) survive;
        // the oldest epoch disappears entirely.
        assert_eq!(doc.total_events(), 4);
        assert!(!doc.0.contains_key(&209));
        assert!(doc.0.contains_key(&210));
        assert!(doc.0.contains_key(&211));
    }

    #[test]
    fn retain_noop_under_limit() {
        let mut doc = FeedDocument::new();
        doc.push(209, 1_000, entry("list"));
        let before = doc.clone();
        doc.retain_newest(1024);
        assert_eq!(doc, before);
    }

    #[test]
    fn purge_since_drops_buckets_and_empty_epochs() {
        let mut doc = FeedDocument::new();
        doc.push(209, 1_000, entry("list"));
        doc.push(210, 2_000, entry("bid"));
        doc.push(210, 2_500, entry("sold"));

        let removed = doc.purge_since(2_000);

        assert_eq!(removed, 2);
        assert_eq!(doc.total_events(), 1);
        assert!(!doc.0.contains_key(&210));
    }

    #[test]
    fn json_roundtrip_uses_string_keys() {
        let mut doc = FeedDocument::new();
        doc.push(209, 1_000, entry("list"));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"209\""));
        assert!(json.contains("\"1000\""));
        let back: FeedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
