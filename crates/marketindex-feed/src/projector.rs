//! Folds confirmed event batches into the published feed.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use marketindex_core::{ChainPoint, EventKind, FeedConfig, IndexError, PendingEvent, SlotClock};

use crate::bucket::{FeedDocument, FeedEntry};
use crate::metadata::{MetadataSource, TokenInfo};
use crate::writer::FeedWriter;

/// Projects confirmed pending events into the bounded feed document and
/// keeps the on-disk copy current.
///
/// All mutation paths (fold after a release, purge after a rollback) run
/// under one mutex, so a drain and a reorg can never interleave a publish.
pub struct FeedProjector<M> {
    document: Mutex<FeedDocument>,
    writer: FeedWriter,
    clock: SlotClock,
    metadata: M,
    max_events: usize,
    lookup_timeout: Duration,
}

impl<M: MetadataSource> FeedProjector<M> {
    /// Build a projector over `config`, loading the previously published
    /// document (an unreadable one starts empty — the feed is a cache).
    pub async fn load(config: &FeedConfig, clock: SlotClock, metadata: M) -> Self {
        let writer = FeedWriter::new(config.path.clone(), config.compress_command.clone());
        let document = writer.load().await;
        Self {
            document: Mutex::new(document),
            writer,
            clock,
            metadata,
            max_events: config.max_events,
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms),
        }
    }

    /// Fold one confirmed batch into the feed and publish if it changed.
    ///
    /// Events without a displayable kind or without assets are recorded
    /// upstream but never surface here. An opaque payload or unknown kind is
    /// logged and skipped — a newer writer's rows must not wedge the drain.
    pub async fn fold(&self, batch: &[PendingEvent]) -> Result<(), IndexError> {
        let mut document = self.document.lock().await;
        let mut changed = false;

        for event in batch {
            let Some(kind) = EventKind::parse(&event.kind) else {
                warn!(kind = %event.kind, id = event.id, "unknown pending event kind skipped");
                continue;
            };
            let Some(action) = kind.feed_action() else {
                continue;
            };
            let Some(summary) = event.payload.as_parsed() else {
                warn!(id = event.id, "opaque pending event payload skipped");
                continue;
            };
            let Some(unit) = summary.assets.first_unit() else {
                continue;
            };

            let info = self.lookup(unit).await;
            let entry = FeedEntry {
                kind: action.to_string(),
                token: info.id,
                value: summary.lovelace,
                fingerprint: info.fingerprint,
                addr: summary.counterparty().map(str::to_string),
                metadata: info.metadata,
                tk: info.access_token,
            };
            document.push(
                self.clock.epoch(summary.slot),
                self.clock.timestamp(summary.slot),
                entry,
            );
            changed = true;
        }

        if changed {
            document.retain_newest(self.max_events);
            self.writer.publish(&document).await?;
        }
        Ok(())
    }

    /// Drop every bucket at or past `point`'s timestamp. Called after a
    /// store rollback, and at startup against the durable checkpoint to
    /// heal a crash between store commit and feed purge.
    pub async fn purge_since(&self, point: &ChainPoint) -> Result<(), IndexError> {
        let mut document = self.document.lock().await;
        let cutoff = self.clock.timestamp(point.slot);
        let removed = document.purge_since(cutoff);
        if removed > 0 {
            info!(removed, cutoff, "purged feed past rollback point");
            self.writer.publish(&document).await?;
        }
        Ok(())
    }

    /// Current in-memory event count (the published copy matches after any
    /// fold/purge).
    pub async fn total_events(&self) -> usize {
        self.document.lock().await.total_events()
    }

    async fn lookup(&self, unit: &str) -> TokenInfo {
        match tokio::time::timeout(self.lookup_timeout, self.metadata.lookup(unit)).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                warn!(unit, error = %e, "metadata lookup failed; using null metadata");
                TokenInfo::null(unit)
            }
            Err(_) => {
                warn!(unit, "metadata lookup timed out; using null metadata");
                TokenInfo::null(unit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marketindex_core::{AssetBundle, EventSummary, MaybeParsed};

    fn config(dir: &tempfile::TempDir) -> FeedConfig {
        FeedConfig {
            path: dir.path().join("activity"),
            max_events: 1024,
            compress_command: None,
            lookup_timeout_ms: 200,
        }
    }

    fn pending(id: i64, slot: u64, kind: &str, assets: AssetBundle) -> PendingEvent {
        PendingEvent {
            id,
            point: ChainPoint::new(slot, "a".repeat(64)),
            kind: kind.into(),
            payload: MaybeParsed::Parsed(EventSummary {
                slot,
                assets,
                lovelace: 10_000_000,
                owner: Some("addr1owner".into()),
                buyer: None,
                seller: None,
            }),
        }
    }

    struct FailingMetadata;

    #[async_trait]
    impl MetadataSource for FailingMetadata {
        async fn lookup(&self, _unit: &str) -> Result<TokenInfo, IndexError> {
            Err(IndexError::Transient("cdn unreachable".into()))
        }
    }

    struct StalledMetadata;

    #[async_trait]
    impl MetadataSource for StalledMetadata {
        async fn lookup(&self, unit: &str) -> Result<TokenInfo, IndexError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TokenInfo::null(unit))
        }
    }

    #[tokio::test]
    async fn fold_buckets_by_epoch_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let clock = SlotClock::mainnet();
        let projector =
            FeedProjector::load(&config(&dir), clock.clone(), crate::NullMetadata).await;

        let slot = 87_848_215;
        projector
            .fold(&[pending(1, slot, "ListingSingle", AssetBundle::single("p0a0", 1))])
            .await
            .unwrap();

        let document = projector.document.lock().await;
        let bucket = &document.0[&clock.epoch(slot)][&clock.timestamp(slot)];
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].kind, "list");
        assert_eq!(bucket[0].addr.as_deref(), Some("addr1owner"));
    }

    #[tokio::test]
    async fn fold_skips_undisplayable_events() {
        let dir = tempfile::tempdir().unwrap();
        let projector =
            FeedProjector::load(&config(&dir), SlotClock::mainnet(), crate::NullMetadata).await;

        projector
            .fold(&[
                // Bundle kinds stay internal.
                pending(1, 5_000_000, "ListingBundle", AssetBundle::single("p0a0", 1)),
                // No assets, nothing to display.
                pending(2, 5_000_000, "BuySingle", AssetBundle::new()),
                // Unknown kind from a future writer.
                pending(3, 5_000_000, "SomethingNew", AssetBundle::single("p0a0", 1)),
            ])
            .await
            .unwrap();

        assert_eq!(projector.total_events().await, 0);
        // Nothing changed, nothing published.
        assert!(!config(&dir).path.exists());
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_to_null_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let projector =
            FeedProjector::load(&config(&dir), SlotClock::mainnet(), FailingMetadata).await;

        projector
            .fold(&[pending(1, 5_000_000, "BuySingle", AssetBundle::single("p0a0", 1))])
            .await
            .unwrap();

        let document = projector.document.lock().await;
        let entry = document.0.values().flat_map(|b| b.values()).flatten().next().unwrap();
        assert_eq!(entry.token, "p0a0");
        assert!(entry.metadata.is_null());
    }

    #[tokio::test]
    async fn stalled_lookup_times_out_into_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let projector =
            FeedProjector::load(&config(&dir), SlotClock::mainnet(), StalledMetadata).await;

        projector
            .fold(&[pending(1, 5_000_000, "BidSingle", AssetBundle::single("p0a0", 1))])
            .await
            .unwrap();
        assert_eq!(projector.total_events().await, 1);
    }

    #[tokio::test]
    async fn retention_bounds_the_published_feed() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.max_events = 4;
        let projector =
            FeedProjector::load(&cfg, SlotClock::mainnet(), crate::NullMetadata).await;

        // Ten events across distinct timestamps and two epochs.
        let batch: Vec<_> = (0..10)
            .map(|i| {
                pending(
                    i,
                    5_000_000 + (i as u64) * 432_000 / 2,
                    "ListingSingle",
                    AssetBundle::single(format!("p0a{i}"), 1),
                )
            })
            .collect();
        projector.fold(&batch).await.unwrap();

        // The crossing bucket is kept whole, so the bound may overshoot by
        // one bucket — never undershoot.
        let total = projector.total_events().await;
        assert!(total <= 5, "kept {total}");
        assert!(total >= 4);

        // Oldest buckets were evicted; the newest survives.
        let document = projector.document.lock().await;
        let newest_ts = SlotClock::mainnet().timestamp(5_000_000 + 9 * 432_000 / 2);
        assert!(document
            .0
            .values()
            .any(|buckets| buckets.contains_key(&newest_ts)));
    }

    #[tokio::test]
    async fn purge_since_trims_and_republishes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let clock = SlotClock::mainnet();
        let projector = FeedProjector::load(&cfg, clock.clone(), crate::NullMetadata).await;

        projector
            .fold(&[
                pending(1, 5_000_000, "ListingSingle", AssetBundle::single("p0a0", 1)),
                pending(2, 5_000_100, "BuySingle", AssetBundle::single("p0a1", 1)),
            ])
            .await
            .unwrap();
        assert_eq!(projector.total_events().await, 2);

        projector
            .purge_since(&ChainPoint::new(5_000_100, "b".repeat(64)))
            .await
            .unwrap();
        assert_eq!(projector.total_events().await, 1);

        // The published copy was rewritten too.
        let reloaded = FeedWriter::new(cfg.path.clone(), None).load().await;
        assert_eq!(reloaded.total_events(), 1);
    }

    #[tokio::test]
    async fn reload_resumes_from_published_document() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        {
            let projector =
                FeedProjector::load(&cfg, SlotClock::mainnet(), crate::NullMetadata).await;
            projector
                .fold(&[pending(1, 5_000_000, "ListingSingle", AssetBundle::single("p0a0", 1))])
                .await
                .unwrap();
        }
        let projector =
            FeedProjector::load(&cfg, SlotClock::mainnet(), crate::NullMetadata).await;
        assert_eq!(projector.total_events().await, 1);
    }
}
