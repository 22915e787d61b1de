//! SQLite-backed marketplace store.
//!
//! Persists open listings/bids, append-only sales/cancellations, the
//! pending-event queue, and the two-pointer checkpoint in a single SQLite
//! file. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! The store assumes a single logical writer (the ingestion task); every
//! producer message is applied inside one transaction, with the sync-point
//! advance as the final write so crash recovery can safely re-apply.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use marketindex_core::codec;
use marketindex_core::{
    ActivityRow, AssetBundle, BidEvent, BidRecord, CancellationEvent, CancellationRecord,
    ChainPoint, Checkpoint, EventKind, EventSummary, IndexError, ListingEvent, ListingRecord,
    MarketEvent, MaybeParsed, OutputRef, PendingEvent, SaleEvent, SaleRecord, SpendTarget,
};

/// Table and view creation, executed statement by statement on open.
const SCHEMA: &[&str] = &[
    "PRAGMA journal_mode=WAL;",
    "CREATE TABLE IF NOT EXISTS listings (
        output_reference TEXT PRIMARY KEY,
        slot             INTEGER NOT NULL,
        header_hash      TEXT    NOT NULL,
        spent            BOOLEAN NOT NULL DEFAULT FALSE,
        listing_kind     TEXT    NOT NULL,
        assets           TEXT    NOT NULL,
        owner            TEXT    NOT NULL,
        lovelace         INTEGER NOT NULL,
        private_to       TEXT
    );",
    "CREATE TABLE IF NOT EXISTS bids (
        output_reference TEXT PRIMARY KEY,
        slot             INTEGER NOT NULL,
        header_hash      TEXT    NOT NULL,
        spent            BOOLEAN NOT NULL DEFAULT FALSE,
        bid_kind         TEXT    NOT NULL,
        assets           TEXT,
        policy_id        TEXT,
        constraints      TEXT,
        owner            TEXT    NOT NULL,
        lovelace         INTEGER NOT NULL,
        aux_assets       TEXT
    );",
    "CREATE TABLE IF NOT EXISTS sales (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tx_hash     TEXT,
        slot        INTEGER NOT NULL,
        header_hash TEXT    NOT NULL,
        sale_kind   TEXT    NOT NULL,
        assets      TEXT    NOT NULL,
        lovelace    INTEGER NOT NULL,
        aux_assets  TEXT,
        buyer       TEXT,
        seller      TEXT
    );",
    "CREATE TABLE IF NOT EXISTS cancellations (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        tx_hash     TEXT,
        slot        INTEGER NOT NULL,
        header_hash TEXT    NOT NULL,
        cancel_kind TEXT    NOT NULL,
        assets      TEXT,
        policy_id   TEXT,
        constraints TEXT,
        owner       TEXT    NOT NULL,
        lovelace    INTEGER NOT NULL,
        aux_assets  TEXT
    );",
    "CREATE TABLE IF NOT EXISTS pending_events (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        slot        INTEGER NOT NULL,
        header_hash TEXT    NOT NULL,
        event_kind  TEXT    NOT NULL,
        payload     TEXT    NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS checkpoint (
        id            INTEGER PRIMARY KEY,
        sync_point    TEXT NOT NULL,
        cleanup_point TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_listings_slot ON listings (slot);",
    "CREATE INDEX IF NOT EXISTS idx_bids_slot ON bids (slot);",
    "CREATE INDEX IF NOT EXISTS idx_sales_slot ON sales (slot);",
    "CREATE INDEX IF NOT EXISTS idx_cancellations_slot ON cancellations (slot);",
    "CREATE INDEX IF NOT EXISTS idx_pending_events_slot ON pending_events (slot);",
    "CREATE VIEW IF NOT EXISTS activity AS SELECT * FROM (
        SELECT slot, SUBSTR(output_reference, 1, 64) AS tx_hash, assets,
               listing_kind AS activity_kind, lovelace,
               NULL AS policy_id, NULL AS aux_assets
        FROM listings
        UNION
        SELECT slot, SUBSTR(output_reference, 1, 64), assets,
               bid_kind, lovelace, policy_id, aux_assets
        FROM bids
        UNION
        SELECT slot, tx_hash, assets, sale_kind, lovelace, NULL, aux_assets
        FROM sales
        UNION
        SELECT slot, tx_hash, assets, cancel_kind, lovelace, policy_id, aux_assets
        FROM cancellations
    ) ORDER BY slot DESC LIMIT 100;",
];

/// SQLite-backed store for marketplace entities, facts, pending events, and
/// the checkpoint. Constructed once and passed by reference to every call
/// site — no ambient singletons.
pub struct MarketStore {
    pool: SqlitePool,
    /// Any write since the last [`take_dirty`](Self::take_dirty) poll.
    dirty: AtomicBool,
}

impl MarketStore {
    /// Open (or create) a store at `path`, initializing the checkpoint to
    /// `start_point` on first run (`None` = the empty sentinel, i.e. start
    /// at the tip).
    ///
    /// The path may be a plain file path or a full SQLite URL.
    pub async fn open(path: &str, start_point: Option<&ChainPoint>) -> Result<Self, IndexError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let store = Self {
            pool,
            dirty: AtomicBool::new(false),
        };
        store.init_schema(start_point).await?;
        Ok(store)
    }

    /// Open an in-memory store. All data is lost when dropped; ideal for
    /// tests. Capped at one connection — a pooled second connection would
    /// open a distinct empty database.
    pub async fn in_memory(start_point: Option<&ChainPoint>) -> Result<Self, IndexError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let store = Self {
            pool,
            dirty: AtomicBool::new(false),
        };
        store.init_schema(start_point).await?;
        Ok(store)
    }

    async fn init_schema(&self, start_point: Option<&ChainPoint>) -> Result<(), IndexError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexError::Storage(e.to_string()))?;
        }
        let origin = ChainPoint::origin();
        let start = start_point.unwrap_or(&origin);
        sqlx::query("INSERT OR IGNORE INTO checkpoint (id, sync_point, cleanup_point) VALUES (0, ?, ?)")
            .bind(codec::encode_point(start))
            .bind(codec::encode_point(start))
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    // ─── Message application ────────────────────────────────────────────────

    /// Apply one producer message: persist every entity mutation, enqueue
    /// pending events, then advance the sync point — all in one transaction.
    ///
    /// A duplicate keyed insert aborts the whole message with
    /// [`IndexError::Conflict`]; a spend of an unknown reference is logged
    /// and ignored.
    pub async fn apply_block(
        &self,
        point: &ChainPoint,
        events: &[MarketEvent],
    ) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        for event in events {
            match event {
                MarketEvent::Listing(ev) => Self::insert_listing_with(&mut tx, point, ev).await?,
                MarketEvent::Bid(ev) => Self::insert_bid_with(&mut tx, point, ev).await?,
                MarketEvent::Spend { target, reference } => {
                    if !Self::mark_spent_with(&mut tx, *target, reference).await? {
                        warn!(
                            reference = %reference,
                            target = target.as_str(),
                            "spend of unknown reference ignored"
                        );
                    }
                }
                MarketEvent::Sale(ev) => Self::insert_sale_with(&mut tx, point, ev).await?,
                MarketEvent::Cancellation(ev) => {
                    Self::insert_cancellation_with(&mut tx, point, ev).await?
                }
            }
            if let Some((kind, summary)) = event.summary(point) {
                Self::enqueue_with(&mut tx, point, kind, &summary).await?;
            }
        }

        // The sync point moves last: a crash mid-apply leaves the checkpoint
        // behind, and recovery re-applies the whole message.
        Self::set_sync_with(&mut tx, point).await?;

        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        info!(point = %point, events = events.len(), "applied block");
        Ok(())
    }

    // ─── Single-entity operations ───────────────────────────────────────────

    /// Insert a listing outside a message transaction.
    pub async fn insert_listing(
        &self,
        point: &ChainPoint,
        event: &ListingEvent,
    ) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Self::insert_listing_with(&mut tx, point, event).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Insert a bid outside a message transaction.
    pub async fn insert_bid(&self, point: &ChainPoint, event: &BidEvent) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Self::insert_bid_with(&mut tx, point, event).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Append a sale fact outside a message transaction.
    pub async fn insert_sale(
        &self,
        point: &ChainPoint,
        event: &SaleEvent,
    ) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Self::insert_sale_with(&mut tx, point, event).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Append a cancellation fact outside a message transaction.
    pub async fn insert_cancellation(
        &self,
        point: &ChainPoint,
        event: &CancellationEvent,
    ) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Self::insert_cancellation_with(&mut tx, point, event).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Flag a listing/bid output as consumed. Idempotent; returns `false`
    /// (after a warning) when the reference is unknown — legitimate if the
    /// output predates the indexer's start point.
    pub async fn mark_spent(
        &self,
        target: SpendTarget,
        reference: &OutputRef,
    ) -> Result<bool, IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let known = Self::mark_spent_with(&mut tx, target, reference).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        if known {
            self.dirty.store(true, Ordering::Relaxed);
        } else {
            warn!(reference = %reference, target = target.as_str(), "spend of unknown reference ignored");
        }
        Ok(known)
    }

    /// Queue an event until it is deep enough to surface externally.
    pub async fn enqueue_event(
        &self,
        point: &ChainPoint,
        kind: EventKind,
        summary: &EventSummary,
    ) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Self::enqueue_with(&mut tx, point, kind, summary).await?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    // ─── Reorg reconciliation ───────────────────────────────────────────────

    /// Roll the store back to `target`, in one transaction:
    /// unspent listings/bids past the target on another header are deleted,
    /// spent rows at or past the target slot are revived (every transaction
    /// that could have consumed them was retracted), and sales,
    /// cancellations, and pending events on the abandoned branch are purged.
    /// Finishes by setting the sync point to `target`.
    ///
    /// A cleanup point ahead of `target` is a fatal
    /// [`IndexError::Consistency`] — the safety margin should make that
    /// unreachable.
    pub async fn rollback_to(&self, target: &ChainPoint) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let checkpoint = Self::checkpoint_with(&mut tx).await?;
        if !checkpoint.cleanup_point.is_origin() && checkpoint.cleanup_point.slot > target.slot {
            return Err(IndexError::Consistency {
                cleanup_slot: checkpoint.cleanup_point.slot,
                target_slot: target.slot,
            });
        }

        let slot = target.slot as i64;

        // Creations that exist only on the abandoned branch. Rows in the
        // target block itself (same slot, same header) survive.
        sqlx::query("DELETE FROM listings WHERE slot >= ? AND header_hash != ? AND spent = FALSE")
            .bind(slot)
            .bind(&target.hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        sqlx::query("DELETE FROM bids WHERE slot >= ? AND header_hash != ? AND spent = FALSE")
            .bind(slot)
            .bind(&target.hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        // Every spend past the target was retracted with the branch, so
        // settled rows at or past the target slot come back — revived, never
        // deleted. The slot-alone filter deliberately includes the target
        // block's own rows: their spending transactions sat strictly later.
        sqlx::query("UPDATE listings SET spent = FALSE WHERE slot >= ? AND spent = TRUE")
            .bind(slot)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        sqlx::query("UPDATE bids SET spent = FALSE WHERE slot >= ? AND spent = TRUE")
            .bind(slot)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        // Facts about the abandoned branch are wholly invalid.
        for table in ["sales", "cancellations", "pending_events"] {
            let statement = format!("DELETE FROM {table} WHERE slot >= ? AND header_hash != ?");
            sqlx::query(&statement)
                .bind(slot)
                .bind(&target.hash)
                .execute(&mut *tx)
                .await
                .map_err(|e| IndexError::Storage(e.to_string()))?;
        }

        Self::set_sync_with(&mut tx, target).await?;

        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        warn!(target = %target, "rolled back store");
        Ok(())
    }

    // ─── Cleanup / retention ────────────────────────────────────────────────

    /// Compact settled history once the sync point is `safety_margin` slots
    /// past the cleanup point.
    ///
    /// An empty cleanup sentinel (store started at the tip) is planted at
    /// the sync point without deleting anything. Listings strictly before
    /// and bids at or before the old cleanup slot are removed once spent;
    /// everything younger stays reachable for rollback.
    pub async fn run_cleanup(&self, safety_margin: u64) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let checkpoint = Self::checkpoint_with(&mut tx).await?;

        if checkpoint.cleanup_point.is_origin() {
            Self::set_cleanup_with(&mut tx, &checkpoint.sync_point).await?;
            tx.commit()
                .await
                .map_err(|e| IndexError::Storage(e.to_string()))?;
            self.dirty.store(true, Ordering::Relaxed);
            info!(point = %checkpoint.sync_point, "planted cleanup point");
            return Ok(());
        }

        let distance = checkpoint
            .sync_point
            .slot
            .saturating_sub(checkpoint.cleanup_point.slot);
        if distance < safety_margin {
            debug!(distance, safety_margin, "cleanup deferred");
            return Ok(());
        }

        let cleanup_slot = checkpoint.cleanup_point.slot as i64;
        let listings = sqlx::query("DELETE FROM listings WHERE slot < ? AND spent = TRUE")
            .bind(cleanup_slot)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let bids = sqlx::query("DELETE FROM bids WHERE slot <= ? AND spent = TRUE")
            .bind(cleanup_slot)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        Self::set_cleanup_with(&mut tx, &checkpoint.sync_point).await?;

        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        info!(
            listings = listings.rows_affected(),
            bids = bids.rows_affected(),
            point = %checkpoint.sync_point,
            "cleanup pass complete"
        );
        Ok(())
    }

    // ─── Confirmed-event release ────────────────────────────────────────────

    /// Atomically drain pending events at least `confirmation_depth` slots
    /// behind the sync point.
    ///
    /// `drain` is invoked exactly once with the ordered batch; the events
    /// are deleted in the same transaction only if it succeeds, so a failed
    /// or crashed drain leaves the queue intact. Returns the number of
    /// events released.
    pub async fn release_confirmed<F, Fut>(
        &self,
        confirmation_depth: u64,
        drain: F,
    ) -> Result<usize, IndexError>
    where
        F: FnOnce(Vec<PendingEvent>) -> Fut,
        Fut: Future<Output = Result<(), IndexError>>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        let checkpoint = Self::checkpoint_with(&mut tx).await?;
        let safe_slot = checkpoint.sync_point.slot.saturating_sub(confirmation_depth);

        let rows = sqlx::query(
            "SELECT id, slot, header_hash, event_kind, payload
             FROM pending_events WHERE slot <= ? ORDER BY id",
        )
        .bind(safe_slot as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;
        if rows.is_empty() {
            return Ok(0);
        }

        let events: Vec<PendingEvent> = rows.iter().map(row_to_pending).collect();
        let released = events.len();
        drain(events).await?;

        // The single-writer model makes this delete cover exactly the
        // selected batch.
        sqlx::query("DELETE FROM pending_events WHERE slot <= ?")
            .bind(safe_slot as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.dirty.store(true, Ordering::Relaxed);
        info!(released, safe_slot, "released confirmed events");
        Ok(released)
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    /// The current checkpoint.
    pub async fn checkpoint(&self) -> Result<Checkpoint, IndexError> {
        let row = sqlx::query("SELECT sync_point, cleanup_point FROM checkpoint WHERE id = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        checkpoint_from_row(&row)
    }

    /// Look up a listing by reference.
    pub async fn listing(&self, reference: &OutputRef) -> Result<Option<ListingRecord>, IndexError> {
        let row = sqlx::query("SELECT * FROM listings WHERE output_reference = ?")
            .bind(codec::encode_output_ref(reference))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        row.as_ref().map(row_to_listing).transpose()
    }

    /// Look up a bid by reference.
    pub async fn bid(&self, reference: &OutputRef) -> Result<Option<BidRecord>, IndexError> {
        let row = sqlx::query("SELECT * FROM bids WHERE output_reference = ?")
            .bind(codec::encode_output_ref(reference))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        row.as_ref().map(row_to_bid).transpose()
    }

    /// All sale facts, oldest first.
    pub async fn sales(&self) -> Result<Vec<SaleRecord>, IndexError> {
        let rows = sqlx::query("SELECT * FROM sales ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        rows.iter().map(row_to_sale).collect()
    }

    /// All cancellation facts, oldest first.
    pub async fn cancellations(&self) -> Result<Vec<CancellationRecord>, IndexError> {
        let rows = sqlx::query("SELECT * FROM cancellations ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        rows.iter().map(row_to_cancellation).collect()
    }

    /// Queue depth of the pending-event buffer.
    pub async fn pending_count(&self) -> Result<u64, IndexError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM pending_events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// The most recent marketplace activity across all four tables,
    /// slot-descending, capped at 100 rows.
    pub async fn recent_activity(&self) -> Result<Vec<ActivityRow>, IndexError> {
        let rows = sqlx::query("SELECT * FROM activity")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|row| ActivityRow {
                slot: row.get::<i64, _>("slot") as u64,
                tx_hash: row.get("tx_hash"),
                kind: row.get("activity_kind"),
                assets: row.get("assets"),
                lovelace: row.get::<i64, _>("lovelace") as u64,
                policy_id: row.get("policy_id"),
                aux_assets: row.get("aux_assets"),
            })
            .collect())
    }

    /// Reports (and resets) whether any write happened since the last poll.
    /// Lets the ingestion loop skip idle feed publishes.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Relaxed)
    }

    // ─── Transaction-scoped writes ──────────────────────────────────────────

    async fn insert_listing_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
        event: &ListingEvent,
    ) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO listings
             (output_reference, slot, header_hash, listing_kind, assets, owner, lovelace, private_to)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(codec::encode_output_ref(&event.reference))
        .bind(point.slot as i64)
        .bind(&point.hash)
        .bind(EventKind::Listing(event.kind).as_str())
        .bind(to_json(&event.assets)?)
        .bind(&event.owner)
        .bind(event.lovelace as i64)
        .bind(&event.private_to)
        .execute(&mut *conn)
        .await
        .map_err(|e| keyed_insert_error(e, "listing", &event.reference))?;
        debug!(reference = %event.reference, "listing recorded");
        Ok(())
    }

    async fn insert_bid_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
        event: &BidEvent,
    ) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO bids
             (output_reference, slot, header_hash, bid_kind, assets, policy_id, constraints, owner, lovelace, aux_assets)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(codec::encode_output_ref(&event.reference))
        .bind(point.slot as i64)
        .bind(&point.hash)
        .bind(EventKind::Bid(event.kind).as_str())
        .bind(event.assets.as_ref().map(to_json).transpose()?)
        .bind(&event.policy_id)
        .bind(event.constraints.as_ref().map(to_json).transpose()?)
        .bind(&event.owner)
        .bind(event.lovelace as i64)
        .bind(event.aux_assets.as_ref().map(to_json).transpose()?)
        .execute(&mut *conn)
        .await
        .map_err(|e| keyed_insert_error(e, "bid", &event.reference))?;
        debug!(reference = %event.reference, "bid recorded");
        Ok(())
    }

    async fn mark_spent_with(
        conn: &mut SqliteConnection,
        target: SpendTarget,
        reference: &OutputRef,
    ) -> Result<bool, IndexError> {
        let statement = match target {
            SpendTarget::Listing => "UPDATE listings SET spent = TRUE WHERE output_reference = ?",
            SpendTarget::Bid => "UPDATE bids SET spent = TRUE WHERE output_reference = ?",
        };
        let result = sqlx::query(statement)
            .bind(codec::encode_output_ref(reference))
            .execute(&mut *conn)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_sale_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
        event: &SaleEvent,
    ) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO sales
             (tx_hash, slot, header_hash, sale_kind, assets, lovelace, aux_assets, buyer, seller)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.tx_hash)
        .bind(point.slot as i64)
        .bind(&point.hash)
        .bind(EventKind::Sale(event.kind).as_str())
        .bind(to_json(&event.assets)?)
        .bind(event.lovelace as i64)
        .bind(event.aux_assets.as_ref().map(to_json).transpose()?)
        .bind(&event.buyer)
        .bind(&event.seller)
        .execute(&mut *conn)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn insert_cancellation_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
        event: &CancellationEvent,
    ) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO cancellations
             (tx_hash, slot, header_hash, cancel_kind, assets, policy_id, constraints, owner, lovelace, aux_assets)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.tx_hash)
        .bind(point.slot as i64)
        .bind(&point.hash)
        .bind(EventKind::Cancel(event.kind).as_str())
        .bind(event.assets.as_ref().map(to_json).transpose()?)
        .bind(&event.policy_id)
        .bind(event.constraints.as_ref().map(to_json).transpose()?)
        .bind(&event.owner)
        .bind(event.lovelace as i64)
        .bind(event.aux_assets.as_ref().map(to_json).transpose()?)
        .execute(&mut *conn)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn enqueue_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
        kind: EventKind,
        summary: &EventSummary,
    ) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO pending_events (slot, header_hash, event_kind, payload) VALUES (?, ?, ?, ?)",
        )
        .bind(point.slot as i64)
        .bind(&point.hash)
        .bind(kind.as_str())
        .bind(to_json(summary)?)
        .execute(&mut *conn)
        .await
        .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn set_sync_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
    ) -> Result<(), IndexError> {
        sqlx::query("UPDATE checkpoint SET sync_point = ? WHERE id = 0")
            .bind(codec::encode_point(point))
            .execute(&mut *conn)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn set_cleanup_with(
        conn: &mut SqliteConnection,
        point: &ChainPoint,
    ) -> Result<(), IndexError> {
        sqlx::query("UPDATE checkpoint SET cleanup_point = ? WHERE id = 0")
            .bind(codec::encode_point(point))
            .execute(&mut *conn)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn checkpoint_with(conn: &mut SqliteConnection) -> Result<Checkpoint, IndexError> {
        let row = sqlx::query("SELECT sync_point, cleanup_point FROM checkpoint WHERE id = 0")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        checkpoint_from_row(&row)
    }
}

// ─── Row decoding ─────────────────────────────────────────────────────────────

fn checkpoint_from_row(row: &SqliteRow) -> Result<Checkpoint, IndexError> {
    Ok(Checkpoint {
        sync_point: codec::decode_point(row.get("sync_point"))?,
        cleanup_point: codec::decode_point(row.get("cleanup_point"))?,
    })
}

fn point_from_row(row: &SqliteRow) -> ChainPoint {
    ChainPoint::new(row.get::<i64, _>("slot") as u64, row.get::<String, _>("header_hash"))
}

fn row_to_listing(row: &SqliteRow) -> Result<ListingRecord, IndexError> {
    let kind_text: String = row.get("listing_kind");
    let kind = match EventKind::parse(&kind_text) {
        Some(EventKind::Listing(kind)) => kind,
        _ => {
            return Err(IndexError::Storage(format!(
                "unexpected listing kind {kind_text:?}"
            )))
        }
    };
    Ok(ListingRecord {
        reference: codec::decode_output_ref(row.get("output_reference"))?,
        point: point_from_row(row),
        kind,
        spent: row.get("spent"),
        assets: from_json(row.get("assets"))?,
        owner: row.get("owner"),
        lovelace: row.get::<i64, _>("lovelace") as u64,
        private_to: row.get("private_to"),
    })
}

fn row_to_bid(row: &SqliteRow) -> Result<BidRecord, IndexError> {
    let kind_text: String = row.get("bid_kind");
    let kind = match EventKind::parse(&kind_text) {
        Some(EventKind::Bid(kind)) => kind,
        _ => {
            return Err(IndexError::Storage(format!(
                "unexpected bid kind {kind_text:?}"
            )))
        }
    };
    Ok(BidRecord {
        reference: codec::decode_output_ref(row.get("output_reference"))?,
        point: point_from_row(row),
        kind,
        spent: row.get("spent"),
        assets: row
            .get::<Option<String>, _>("assets")
            .map(|text| from_json(text))
            .transpose()?,
        policy_id: row.get("policy_id"),
        constraints: row
            .get::<Option<String>, _>("constraints")
            .map(|text| MaybeParsed::parse(&text)),
        owner: row.get("owner"),
        lovelace: row.get::<i64, _>("lovelace") as u64,
        aux_assets: row
            .get::<Option<String>, _>("aux_assets")
            .map(|text| from_json(text))
            .transpose()?,
    })
}

fn row_to_sale(row: &SqliteRow) -> Result<SaleRecord, IndexError> {
    let kind_text: String = row.get("sale_kind");
    let kind = match EventKind::parse(&kind_text) {
        Some(EventKind::Sale(kind)) => kind,
        _ => {
            return Err(IndexError::Storage(format!(
                "unexpected sale kind {kind_text:?}"
            )))
        }
    };
    Ok(SaleRecord {
        id: row.get("id"),
        tx_hash: row.get::<Option<String>, _>("tx_hash").unwrap_or_default(),
        point: point_from_row(row),
        kind,
        assets: from_json(row.get("assets"))?,
        lovelace: row.get::<i64, _>("lovelace") as u64,
        aux_assets: row
            .get::<Option<String>, _>("aux_assets")
            .map(|text| from_json(text))
            .transpose()?,
        buyer: row.get("buyer"),
        seller: row.get("seller"),
    })
}

fn row_to_cancellation(row: &SqliteRow) -> Result<CancellationRecord, IndexError> {
    let kind_text: String = row.get("cancel_kind");
    let kind = match EventKind::parse(&kind_text) {
        Some(EventKind::Cancel(kind)) => kind,
        _ => {
            return Err(IndexError::Storage(format!(
                "unexpected cancellation kind {kind_text:?}"
            )))
        }
    };
    Ok(CancellationRecord {
        id: row.get("id"),
        tx_hash: row.get::<Option<String>, _>("tx_hash").unwrap_or_default(),
        point: point_from_row(row),
        kind,
        assets: row
            .get::<Option<String>, _>("assets")
            .map(|text| from_json(text))
            .transpose()?,
        policy_id: row.get("policy_id"),
        constraints: row
            .get::<Option<String>, _>("constraints")
            .map(|text| MaybeParsed::parse(&text)),
        owner: row.get("owner"),
        lovelace: row.get::<i64, _>("lovelace") as u64,
        aux_assets: row
            .get::<Option<String>, _>("aux_assets")
            .map(|text| from_json(text))
            .transpose()?,
    })
}

fn row_to_pending(row: &SqliteRow) -> PendingEvent {
    let payload: String = row.get("payload");
    PendingEvent {
        id: row.get("id"),
        point: point_from_row(row),
        kind: row.get("event_kind"),
        payload: MaybeParsed::parse(&payload),
    }
}

// ─── JSON helpers ─────────────────────────────────────────────────────────────

fn to_json<T: Serialize>(value: &T) -> Result<String, IndexError> {
    serde_json::to_string(value).map_err(|e| IndexError::Storage(e.to_string()))
}

fn from_json(text: String) -> Result<AssetBundle, IndexError> {
    serde_json::from_str(&text)
        .map_err(|e| IndexError::Storage(format!("corrupt asset column: {e}")))
}

fn keyed_insert_error(e: sqlx::Error, kind: &'static str, reference: &OutputRef) -> IndexError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return IndexError::Conflict {
                kind,
                reference: reference.to_string(),
            };
        }
    }
    IndexError::Storage(e.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
