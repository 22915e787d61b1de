//! Stored-row shapes returned by the persistent store.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetBundle, BidConstraints, MaybeParsed};
use crate::event::{BidKind, CancelKind, EventSummary, ListingKind, SaleKind};
use crate::point::{ChainPoint, OutputRef};

/// The two-pointer checkpoint singleton.
///
/// `sync_point` is the furthest ingested point; `cleanup_point` the furthest
/// compacted one. `cleanup_point.slot <= sync_point.slot` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sync_point: ChainPoint,
    pub cleanup_point: ChainPoint,
}

/// An open (or settled-but-retained) listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub reference: OutputRef,
    pub point: ChainPoint,
    pub kind: ListingKind,
    /// Consumed by a later transaction. Settled rows are kept until cleanup
    /// so a rollback can revive them.
    pub spent: bool,
    pub assets: AssetBundle,
    pub owner: String,
    pub lovelace: u64,
    pub private_to: Option<String>,
}

/// An open (or settled-but-retained) bid row.
#[derive(Debug, Clone, PartialEq)]
pub struct BidRecord {
    pub reference: OutputRef,
    pub point: ChainPoint,
    pub kind: BidKind,
    pub spent: bool,
    pub assets: Option<AssetBundle>,
    pub policy_id: Option<String>,
    pub constraints: Option<MaybeParsed<BidConstraints>>,
    pub owner: String,
    pub lovelace: u64,
    pub aux_assets: Option<AssetBundle>,
}

/// An append-only completed-trade row.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub id: i64,
    pub tx_hash: String,
    pub point: ChainPoint,
    pub kind: SaleKind,
    pub assets: AssetBundle,
    pub lovelace: u64,
    pub aux_assets: Option<AssetBundle>,
    pub buyer: Option<String>,
    pub seller: Option<String>,
}

/// An append-only withdrawal row.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationRecord {
    pub id: i64,
    pub tx_hash: String,
    pub point: ChainPoint,
    pub kind: CancelKind,
    pub assets: Option<AssetBundle>,
    pub policy_id: Option<String>,
    pub constraints: Option<MaybeParsed<BidConstraints>>,
    pub owner: String,
    pub lovelace: u64,
    pub aux_assets: Option<AssetBundle>,
}

/// A queued event awaiting depth confirmation.
///
/// The kind is kept as raw text so a row written by a newer version never
/// poisons the release path; the projector parses it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub id: i64,
    pub point: ChainPoint,
    pub kind: String,
    pub payload: MaybeParsed<EventSummary>,
}

/// One row of the read-only `activity` view — the most recent marketplace
/// actions across all four tables, slot-descending.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub slot: u64,
    pub tx_hash: String,
    pub kind: String,
    pub assets: Option<String>,
    pub lovelace: u64,
    pub policy_id: Option<String>,
    pub aux_assets: Option<String>,
}
