//! The closed marketplace event set.
//!
//! Every producer message carries a list of these. The set is deliberately
//! one enum with per-kind payloads: the store applies each variant exactly
//! once, and each kind knows its own external feed action, so adding a kind
//! extends this module rather than a branch at every call site.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetBundle, BidConstraints};
use crate::point::{ChainPoint, OutputRef};

// ─── Kinds ────────────────────────────────────────────────────────────────────

/// Listing shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    Single,
    Bundle,
}

/// Bid shapes. `Open` targets an entire policy under structural constraints
/// instead of a concrete asset set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidKind {
    Single,
    Bundle,
    Open,
}

/// Completed-trade shapes. `Buy*` is taker-buys-listing, `Sell*` is
/// taker-accepts-bid; `SellSwap` settles a bid carrying auxiliary assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleKind {
    BuySingle,
    BuyBundle,
    SellSingle,
    SellBundle,
    SellSwap,
}

/// Withdrawal shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelKind {
    BidSingle,
    BidBundle,
    BidOpen,
    ListingSingle,
    ListingBundle,
    BidSwap,
}

/// Any event kind, as stored in the pending queue and the activity view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Listing(ListingKind),
    Bid(BidKind),
    Sale(SaleKind),
    Cancel(CancelKind),
}

impl EventKind {
    /// Canonical TEXT form, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing(ListingKind::Single) => "ListingSingle",
            Self::Listing(ListingKind::Bundle) => "ListingBundle",
            Self::Bid(BidKind::Single) => "BidSingle",
            Self::Bid(BidKind::Bundle) => "BidBundle",
            Self::Bid(BidKind::Open) => "BidOpen",
            Self::Sale(SaleKind::BuySingle) => "BuySingle",
            Self::Sale(SaleKind::BuyBundle) => "BuyBundle",
            Self::Sale(SaleKind::SellSingle) => "SellSingle",
            Self::Sale(SaleKind::SellBundle) => "SellBundle",
            Self::Sale(SaleKind::SellSwap) => "SellSwap",
            Self::Cancel(CancelKind::BidSingle) => "CancelBidSingle",
            Self::Cancel(CancelKind::BidBundle) => "CancelBidBundle",
            Self::Cancel(CancelKind::BidOpen) => "CancelBidOpen",
            Self::Cancel(CancelKind::ListingSingle) => "CancelListingSingle",
            Self::Cancel(CancelKind::ListingBundle) => "CancelListingBundle",
            Self::Cancel(CancelKind::BidSwap) => "CancelBidSwap",
        }
    }

    /// Inverse of [`as_str`](Self::as_str). `None` for unknown text.
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "ListingSingle" => Self::Listing(ListingKind::Single),
            "ListingBundle" => Self::Listing(ListingKind::Bundle),
            "BidSingle" => Self::Bid(BidKind::Single),
            "BidBundle" => Self::Bid(BidKind::Bundle),
            "BidOpen" => Self::Bid(BidKind::Open),
            "BuySingle" => Self::Sale(SaleKind::BuySingle),
            "BuyBundle" => Self::Sale(SaleKind::BuyBundle),
            "SellSingle" => Self::Sale(SaleKind::SellSingle),
            "SellBundle" => Self::Sale(SaleKind::SellBundle),
            "SellSwap" => Self::Sale(SaleKind::SellSwap),
            "CancelBidSingle" => Self::Cancel(CancelKind::BidSingle),
            "CancelBidBundle" => Self::Cancel(CancelKind::BidBundle),
            "CancelBidOpen" => Self::Cancel(CancelKind::BidOpen),
            "CancelListingSingle" => Self::Cancel(CancelKind::ListingSingle),
            "CancelListingBundle" => Self::Cancel(CancelKind::ListingBundle),
            "CancelBidSwap" => Self::Cancel(CancelKind::BidSwap),
            _ => return None,
        })
    }

    /// The action string this kind contributes to the published feed, or
    /// `None` for kinds that stay internal (bundle, open and swap shapes are
    /// recorded but not surfaced).
    pub fn feed_action(&self) -> Option<&'static str> {
        match self {
            Self::Listing(ListingKind::Single) => Some("list"),
            Self::Bid(BidKind::Single) => Some("bid"),
            Self::Sale(SaleKind::BuySingle) | Self::Sale(SaleKind::SellSingle) => Some("sold"),
            Self::Cancel(CancelKind::BidSingle) | Self::Cancel(CancelKind::BidOpen) => {
                Some("unbid")
            }
            Self::Cancel(CancelKind::ListingSingle) => Some("unlist"),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payloads ─────────────────────────────────────────────────────────────────

/// A new listing output reported by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEvent {
    pub reference: OutputRef,
    pub kind: ListingKind,
    /// Offered asset bundle.
    pub assets: AssetBundle,
    /// Owner payment credential (bech32).
    pub owner: String,
    /// Requested price.
    pub lovelace: u64,
    /// Beneficiary credential for a private listing.
    pub private_to: Option<String>,
}

/// A new bid output reported by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidEvent {
    pub reference: OutputRef,
    pub kind: BidKind,
    /// Requested asset set (single/bundle bids).
    pub assets: Option<AssetBundle>,
    /// Requested policy (open bids).
    pub policy_id: Option<String>,
    /// Structural constraints (open bids).
    pub constraints: Option<BidConstraints>,
    pub owner: String,
    pub lovelace: u64,
    /// Assets offered next to the lovelace, for NFT <> NFT trades.
    pub aux_assets: Option<AssetBundle>,
}

/// A completed trade. Append-only fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub tx_hash: String,
    pub kind: SaleKind,
    pub assets: AssetBundle,
    pub lovelace: u64,
    /// Swap sales only.
    pub aux_assets: Option<AssetBundle>,
    pub buyer: Option<String>,
    pub seller: Option<String>,
}

/// A withdrawn bid or listing. Append-only fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationEvent {
    pub tx_hash: String,
    pub kind: CancelKind,
    pub assets: Option<AssetBundle>,
    pub policy_id: Option<String>,
    pub constraints: Option<BidConstraints>,
    pub owner: String,
    pub lovelace: u64,
    pub aux_assets: Option<AssetBundle>,
}

/// Which open-entity table a spend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendTarget {
    Listing,
    Bid,
}

impl SpendTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Bid => "bid",
        }
    }
}

// ─── MarketEvent ──────────────────────────────────────────────────────────────

/// One decoded marketplace event within an `Apply` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Listing(ListingEvent),
    Bid(BidEvent),
    /// Consumption of a previously recorded listing/bid output.
    Spend {
        target: SpendTarget,
        reference: OutputRef,
    },
    Sale(SaleEvent),
    Cancellation(CancellationEvent),
}

impl MarketEvent {
    /// The event's kind, for kinds that are recorded as activity.
    /// Spends mutate an existing row and have no kind of their own.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Listing(ev) => Some(EventKind::Listing(ev.kind)),
            Self::Bid(ev) => Some(EventKind::Bid(ev.kind)),
            Self::Sale(ev) => Some(EventKind::Sale(ev.kind)),
            Self::Cancellation(ev) => Some(EventKind::Cancel(ev.kind)),
            Self::Spend { .. } => None,
        }
    }

    /// The pending-queue summary for this event at `point`, or `None` for
    /// events that never reach the external feed (spends).
    pub fn summary(&self, point: &ChainPoint) -> Option<(EventKind, EventSummary)> {
        let kind = self.kind()?;
        let summary = match self {
            Self::Listing(ev) => EventSummary {
                slot: point.slot,
                assets: ev.assets.clone(),
                lovelace: ev.lovelace,
                owner: Some(ev.owner.clone()),
                buyer: None,
                seller: None,
            },
            Self::Bid(ev) => EventSummary {
                slot: point.slot,
                assets: ev.assets.clone().unwrap_or_default(),
                lovelace: ev.lovelace,
                owner: Some(ev.owner.clone()),
                buyer: None,
                seller: None,
            },
            Self::Sale(ev) => EventSummary {
                slot: point.slot,
                assets: ev.assets.clone(),
                lovelace: ev.lovelace,
                owner: None,
                buyer: ev.buyer.clone(),
                seller: ev.seller.clone(),
            },
            Self::Cancellation(ev) => EventSummary {
                slot: point.slot,
                assets: ev.assets.clone().unwrap_or_default(),
                lovelace: ev.lovelace,
                owner: Some(ev.owner.clone()),
                buyer: None,
                seller: None,
            },
            Self::Spend { .. } => unreachable!("kind() returned None"),
        };
        Some((kind, summary))
    }
}

/// What a pending event carries to the feed projector once confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub slot: u64,
    pub assets: AssetBundle,
    pub lovelace: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
}

impl EventSummary {
    /// The counterparty address shown in the feed: the owner if present,
    /// else the buyer when it is a wallet address, else the seller.
    pub fn counterparty(&self) -> Option<&str> {
        if let Some(owner) = &self.owner {
            return Some(owner);
        }
        match &self.buyer {
            Some(buyer) if buyer.starts_with("addr1") => Some(buyer),
            _ => self.seller.as_deref(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_text_roundtrip() {
        let kinds = [
            EventKind::Listing(ListingKind::Single),
            EventKind::Listing(ListingKind::Bundle),
            EventKind::Bid(BidKind::Open),
            EventKind::Sale(SaleKind::SellSwap),
            EventKind::Cancel(CancelKind::BidSwap),
            EventKind::Cancel(CancelKind::ListingBundle),
        ];
        for kind in kinds {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("NotAKind"), None);
    }

    #[test]
    fn feed_actions_cover_only_displayable_kinds() {
        assert_eq!(
            EventKind::Listing(ListingKind::Single).feed_action(),
            Some("list")
        );
        assert_eq!(EventKind::Bid(BidKind::Single).feed_action(), Some("bid"));
        assert_eq!(
            EventKind::Sale(SaleKind::BuySingle).feed_action(),
            Some("sold")
        );
        assert_eq!(
            EventKind::Cancel(CancelKind::BidOpen).feed_action(),
            Some("unbid")
        );
        assert_eq!(
            EventKind::Cancel(CancelKind::ListingSingle).feed_action(),
            Some("unlist")
        );
        // Bundle and swap shapes stay internal.
        assert_eq!(EventKind::Listing(ListingKind::Bundle).feed_action(), None);
        assert_eq!(EventKind::Sale(SaleKind::SellSwap).feed_action(), None);
    }

    #[test]
    fn spend_has_no_summary() {
        let spend = MarketEvent::Spend {
            target: SpendTarget::Listing,
            reference: OutputRef::new("ab".repeat(32), 0),
        };
        assert!(spend.summary(&ChainPoint::new(1, "ff".repeat(32))).is_none());
    }

    #[test]
    fn counterparty_prefers_owner_then_wallet_buyer() {
        let mut summary = EventSummary {
            slot: 1,
            assets: AssetBundle::single("p1a1", 1),
            lovelace: 5_000_000,
            owner: None,
            buyer: Some("addr1qxyz".into()),
            seller: Some("addr1seller".into()),
        };
        assert_eq!(summary.counterparty(), Some("addr1qxyz"));

        summary.buyer = Some("script1notwallet".into());
        assert_eq!(summary.counterparty(), Some("addr1seller"));

        summary.owner = Some("addr1owner".into());
        assert_eq!(summary.counterparty(), Some("addr1owner"));
    }
}
