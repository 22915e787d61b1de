//! The ordered ingestion loop.
//!
//! One task drains the producer and mutates the store; arrival order is the
//! processing order. Every message is one store transaction. Rollbacks go
//! through the store first, then the feed — the feed is a cache, and a crash
//! between the two is healed by the startup trim against the durable
//! checkpoint.
//!
//! Error policy:
//! - `Conflict` — message already applied (producer/indexer desync): log,
//!   skip, never merge.
//! - `Consistency` — cleanup pointer ahead of a rollback target: fatal,
//!   stop and wait for an operator resync.
//! - feed/cleanup errors — isolated; they never block checkpoint
//!   advancement.

use tracing::{debug, error, info, warn};

use marketindex_core::{IndexError, IndexerConfig};
use marketindex_feed::{FeedProjector, MetadataSource};
use marketindex_store::MarketStore;

use crate::producer::{ChainMessage, Producer};

/// Drives one producer stream into the store and the feed.
///
/// Holds references only — the store handle and projector are constructed
/// by the caller and shared with any concurrent readers.
pub struct Ingestor<'a, P, M> {
    config: &'a IndexerConfig,
    store: &'a MarketStore,
    projector: &'a FeedProjector<M>,
    producer: P,
    processed: u64,
}

impl<'a, P: Producer, M: MetadataSource> Ingestor<'a, P, M> {
    pub fn new(
        config: &'a IndexerConfig,
        store: &'a MarketStore,
        projector: &'a FeedProjector<M>,
        producer: P,
    ) -> Self {
        Self {
            config,
            store,
            projector,
            producer,
            processed: 0,
        }
    }

    /// Process messages until the stream ends or a fatal error stops it.
    ///
    /// Resumption always starts from the durable checkpoint; the feed cache
    /// is trimmed past it before the first message, covering a crash that
    /// landed between a store rollback and its feed purge.
    pub async fn run(mut self) -> Result<(), IndexError> {
        let checkpoint = self.store.checkpoint().await?;
        if let Err(e) = self.projector.purge_since(&checkpoint.sync_point).await {
            warn!(error = %e, "startup feed trim failed; feed may lag until next publish");
        }
        info!(point = %checkpoint.sync_point, "resuming from checkpoint");

        while let Some(message) = self.producer.next_message().await? {
            match self.handle(message).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "consistency violation; halting for operator resync");
                    return Err(e);
                }
                Err(e) if e.is_conflict() => {
                    warn!(error = %e, "message already applied; skipping");
                }
                Err(e) => return Err(e),
            }
            self.processed += 1;

            if self.processed % self.config.release_every == 0 {
                self.release(false).await;
            }
            if self.processed % self.config.cleanup_every == 0 {
                if let Err(e) = self.store.run_cleanup(self.config.cleanup_margin).await {
                    warn!(error = %e, "cleanup pass failed");
                }
            }
        }

        // Drain whatever became confirmed before the stream ended.
        self.release(true).await;
        info!(processed = self.processed, "producer stream ended");
        Ok(())
    }

    async fn handle(&self, message: ChainMessage) -> Result<(), IndexError> {
        match message {
            ChainMessage::Apply { point, events } => {
                self.store.apply_block(&point, &events).await
            }
            ChainMessage::Rollback { point } => {
                self.store.rollback_to(&point).await?;
                if let Err(e) = self.projector.purge_since(&point).await {
                    warn!(error = %e, "feed purge failed; will re-trim on restart");
                }
                Ok(())
            }
        }
    }

    /// Release depth-confirmed events into the feed. Skipped while the store
    /// is idle unless `force`d (end of stream). Failures leave the events
    /// queued for the next attempt.
    async fn release(&self, force: bool) {
        if !force && !self.store.take_dirty() {
            return;
        }
        let projector = self.projector;
        let result = self
            .store
            .release_confirmed(self.config.confirmation_depth, |batch| async move {
                projector.fold(&batch).await
            })
            .await;
        match result {
            Ok(0) => {}
            Ok(released) => debug!(released, "published confirmed events"),
            Err(e) => warn!(error = %e, "release deferred; events stay queued"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::ScriptProducer;
    use crate::IndexerBuilder;
    use marketindex_core::{
        AssetBundle, ChainPoint, IndexerConfig, ListingEvent, ListingKind, MarketEvent, OutputRef,
        SaleEvent, SaleKind, SpendTarget,
    };
    use marketindex_feed::NullMetadata;

    fn pt(slot: u64, seed: char) -> ChainPoint {
        ChainPoint::new(slot, seed.to_string().repeat(64))
    }

    fn outref(seed: char, index: u32) -> OutputRef {
        OutputRef::new(seed.to_string().repeat(64), index)
    }

    fn listing(seed: char) -> MarketEvent {
        MarketEvent::Listing(ListingEvent {
            reference: outref(seed, 0),
            kind: ListingKind::Single,
            assets: AssetBundle::single(format!("policy0asset{seed}"), 1),
            owner: "addr1owner".into(),
            lovelace: 10_000_000,
            private_to: None,
        })
    }

    fn test_config(dir: &tempfile::TempDir) -> IndexerConfig {
        IndexerBuilder::new()
            .confirmation_depth(100)
            .release_every(1)
            .cleanup_every(1_000)
            .feed_path(dir.path().join("activity"))
            .build_config()
    }

    async fn run_script(
        config: &IndexerConfig,
        store: &MarketStore,
        projector: &FeedProjector<NullMetadata>,
        script: Vec<ChainMessage>,
    ) -> Result<(), IndexError> {
        Ingestor::new(config, store, projector, ScriptProducer::new(script))
            .run()
            .await
    }

    #[tokio::test]
    async fn applies_messages_and_publishes_confirmed_events() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = MarketStore::in_memory(None).await.unwrap();
        let projector =
            FeedProjector::load(&config.feed, config.clock.clone(), NullMetadata).await;

        run_script(
            &config,
            &store,
            &projector,
            vec![
                ChainMessage::Apply {
                    point: pt(5_000_000, 'a'),
                    events: vec![listing('1')],
                },
                ChainMessage::Apply {
                    point: pt(5_000_200, 'b'),
                    events: vec![listing('2')],
                },
            ],
        )
        .await
        .unwrap();

        // Both listings landed in the store.
        assert!(store.listing(&outref('1', 0)).await.unwrap().is_some());
        assert!(store.listing(&outref('2', 0)).await.unwrap().is_some());

        // The first listing is 200 slots deep (> depth 100) and published;
        // the second sits at the sync point and stays queued.
        assert_eq!(projector.total_events().await, 1);
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert!(config.feed.path.exists());
    }

    #[tokio::test]
    async fn conflicting_replay_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = MarketStore::in_memory(None).await.unwrap();
        let projector =
            FeedProjector::load(&config.feed, config.clock.clone(), NullMetadata).await;

        let apply = ChainMessage::Apply {
            point: pt(5_000_000, 'a'),
            events: vec![listing('1')],
        };
        run_script(
            &config,
            &store,
            &projector,
            vec![apply.clone(), apply, ChainMessage::Apply {
                point: pt(5_000_100, 'b'),
                events: vec![listing('2')],
            }],
        )
        .await
        .unwrap();

        // Processing continued past the duplicate.
        assert!(store.listing(&outref('2', 0)).await.unwrap().is_some());
        assert_eq!(store.checkpoint().await.unwrap().sync_point, pt(5_000_100, 'b'));
    }

    #[tokio::test]
    async fn rollback_reconciles_store_and_feed() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = MarketStore::in_memory(None).await.unwrap();
        let projector =
            FeedProjector::load(&config.feed, config.clock.clone(), NullMetadata).await;

        let sale = MarketEvent::Sale(SaleEvent {
            tx_hash: "e".repeat(64),
            kind: SaleKind::BuySingle,
            assets: AssetBundle::single("policy0asset1", 1),
            lovelace: 10_000_000,
            aux_assets: None,
            buyer: Some("addr1buyer".into()),
            seller: None,
        });

        run_script(
            &config,
            &store,
            &projector,
            vec![
                ChainMessage::Apply {
                    point: pt(5_000_000, 'a'),
                    events: vec![listing('1')],
                },
                ChainMessage::Apply {
                    point: pt(5_000_200, 'b'),
                    events: vec![
                        MarketEvent::Spend {
                            target: SpendTarget::Listing,
                            reference: outref('1', 0),
                        },
                        sale,
                    ],
                },
                // Sale gets deep enough to publish, then the branch dies.
                ChainMessage::Apply {
                    point: pt(5_000_400, 'c'),
                    events: vec![],
                },
                ChainMessage::Rollback {
                    point: pt(5_000_000, 'a'),
                },
            ],
        )
        .await
        .unwrap();

        // Store: listing revived, sale gone, checkpoint back at the target.
        let revived = store.listing(&outref('1', 0)).await.unwrap().unwrap();
        assert!(!revived.spent);
        assert!(store.sales().await.unwrap().is_empty());
        assert_eq!(store.checkpoint().await.unwrap().sync_point, pt(5_000_000, 'a'));

        // Feed: the purge cutoff is the target's own timestamp, so both
        // published buckets (slots 5_000_000 and 5_000_200) are gone.
        assert_eq!(projector.total_events().await, 0);
    }

    #[tokio::test]
    async fn consistency_violation_halts_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir);
        config.cleanup_margin = 100;
        config.cleanup_every = 1;
        let start = pt(4_950_000, 'a');
        let store = MarketStore::in_memory(Some(&start)).await.unwrap();
        let projector =
            FeedProjector::load(&config.feed, config.clock.clone(), NullMetadata).await;

        let err = run_script(
            &config,
            &store,
            &projector,
            vec![
                // Advances sync far past the margin; the post-message cleanup
                // pass then drags the cleanup pointer up to 5_000_000.
                ChainMessage::Apply {
                    point: pt(5_000_000, 'b'),
                    events: vec![],
                },
                // A rollback behind the cleanup pointer cannot be honored.
                ChainMessage::Rollback {
                    point: pt(4_990_000, 'c'),
                },
            ],
        )
        .await
        .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn startup_trims_feed_past_the_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = MarketStore::in_memory(None).await.unwrap();
        let projector =
            FeedProjector::load(&config.feed, config.clock.clone(), NullMetadata).await;

        // A published batch, then a store rollback whose feed purge "crashed".
        run_script(
            &config,
            &store,
            &projector,
            vec![
                ChainMessage::Apply {
                    point: pt(5_000_000, 'a'),
                    events: vec![listing('1')],
                },
                ChainMessage::Apply {
                    point: pt(5_000_200, 'b'),
                    events: vec![],
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(projector.total_events().await, 1);
        store.rollback_to(&pt(4_999_000, 'c')).await.unwrap();

        // Next run starts by re-trimming the cache from the checkpoint.
        run_script(&config, &store, &projector, vec![]).await.unwrap();
        assert_eq!(projector.total_events().await, 0);
    }
}
