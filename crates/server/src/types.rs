//! RPC-compatible types for the dev harness.
//!
//! JSON-serializable versions of the engine types: principals and 32-byte
//! blobs are hex strings, 128-bit amounts are decimal strings.

use gavel_types::events::AuctionEvent;
use gavel_types::{AuctionKind, AuctionRecord, AuctionStatus, Schedule};
use serde::{Deserialize, Serialize};

/// Parameters for creating an auction. Per-kind fields are optional and
/// validated against `kind` when the request is translated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    /// "english", "all_pay", "vickrey", "linear_rdutch", or "exp_rdutch"
    pub kind: String,
    pub name: String,
    /// "unique" or "fungible"
    pub asset_kind: String,
    /// Hex-encoded asset id (32 bytes)
    pub asset_id: String,
    /// Token id (unique) or amount (fungible), decimal
    pub id_or_amount: String,
    /// Hex-encoded pay asset id (32 bytes)
    pub pay_asset: String,

    // English / all-pay
    pub starting_bid: Option<String>,
    pub min_bid_delta: Option<String>,
    pub duration: Option<u64>,
    pub deadline_extension: Option<u64>,

    // Vickrey
    pub min_bid: Option<String>,
    pub commit_duration: Option<u64>,
    pub reveal_duration: Option<u64>,
    pub commit_fee: Option<String>,

    // Reverse-Dutch
    pub start_price: Option<String>,
    pub min_price: Option<String>,
    pub decay_factor: Option<u64>,
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidParams {
    pub sender: String,
    pub auction_id: u64,
    /// Decimal delta; absent for reverse-Dutch.
    pub amount: Option<String>,
}

/// Parameters for submitting a sealed-bid commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBidParams {
    pub sender: String,
    pub auction_id: u64,
    /// Hex-encoded commitment (32 bytes)
    pub commitment: String,
    /// Decimal fee amount
    pub fee_amount: String,
}

/// Parameters for opening a sealed bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBidParams {
    pub sender: String,
    pub auction_id: u64,
    /// Decimal amount
    pub amount: String,
    /// Hex-encoded salt (32 bytes)
    pub salt: String,
}

/// Sender plus auction id, for claim/withdraw/cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCall {
    pub sender: String,
    pub auction_id: u64,
}

/// Auction record for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRecordRpc {
    pub auction_id: u64,
    pub kind: String,
    pub name: String,
    pub asset_kind: String,
    pub auctioneer: String,
    pub item_asset: String,
    pub item_value: String,
    pub pay_asset: String,
    pub status: String,
    pub winner: String,
    pub available_funds: String,
    pub is_claimed: bool,
    pub fee_bps: u16,
    pub created_at: u64,
    pub schedule: ScheduleRpc,
}

/// Schedule for RPC responses, flattened per family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ScheduleRpc {
    Ascending {
        starting_bid: String,
        min_bid_delta: String,
        deadline: u64,
        deadline_extension: u64,
        highest_bid: String,
    },
    Sealed {
        min_bid: String,
        commit_end: u64,
        reveal_end: u64,
        commit_fee: String,
        winning_bid: String,
        accumulated_commit_fee: String,
    },
    Descending {
        start_price: String,
        min_price: String,
        start_ts: u64,
        deadline: u64,
        duration: u64,
        decay_factor: Option<u64>,
        settle_price: String,
    },
}

/// Engine event for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRpc {
    Created {
        auction_id: u64,
        kind: String,
        auctioneer: String,
        deadline: u64,
    },
    Bid {
        auction_id: u64,
        bidder: String,
        amount: String,
        highest_bid: String,
        deadline: u64,
    },
    Committed {
        auction_id: u64,
        bidder: String,
        commitment: String,
        fee: String,
    },
    Revealed {
        auction_id: u64,
        bidder: String,
        amount: String,
        winner: String,
        winning_bid: String,
    },
    Claimed {
        auction_id: u64,
        winner: String,
        refund: String,
    },
    Withdrawn {
        auction_id: u64,
        auctioneer: String,
        proceeds: String,
        fee: String,
        commit_fees: String,
    },
    Cancelled {
        auction_id: u64,
        auctioneer: String,
    },
}

pub fn kind_name(kind: AuctionKind) -> &'static str {
    match kind {
        AuctionKind::English => "english",
        AuctionKind::AllPay => "all_pay",
        AuctionKind::Vickrey => "vickrey",
        AuctionKind::LinearReverseDutch => "linear_rdutch",
        AuctionKind::ExpReverseDutch => "exp_rdutch",
    }
}

pub fn parse_kind(s: &str) -> Option<AuctionKind> {
    match s {
        "english" => Some(AuctionKind::English),
        "all_pay" => Some(AuctionKind::AllPay),
        "vickrey" => Some(AuctionKind::Vickrey),
        "linear_rdutch" => Some(AuctionKind::LinearReverseDutch),
        "exp_rdutch" => Some(AuctionKind::ExpReverseDutch),
        _ => None,
    }
}

impl From<&AuctionRecord> for AuctionRecordRpc {
    fn from(r: &AuctionRecord) -> Self {
        Self {
            auction_id: r.id,
            kind: kind_name(r.kind).to_string(),
            name: r.name.clone(),
            asset_kind: match r.asset_kind {
                gavel_types::AssetKind::Unique => "unique",
                gavel_types::AssetKind::Fungible => "fungible",
            }
            .to_string(),
            auctioneer: hex::encode(r.auctioneer),
            item_asset: hex::encode(r.item_asset),
            item_value: r.item_value.to_string(),
            pay_asset: hex::encode(r.pay_asset),
            status: match r.status {
                AuctionStatus::Open => "open",
                AuctionStatus::Revealing => "revealing",
                AuctionStatus::Settled => "settled",
                AuctionStatus::Cancelled => "cancelled",
            }
            .to_string(),
            winner: hex::encode(r.winner),
            available_funds: r.available_funds.to_string(),
            is_claimed: r.is_claimed,
            fee_bps: r.fee_bps_snapshot,
            created_at: r.created_at,
            schedule: ScheduleRpc::from(&r.schedule),
        }
    }
}

impl From<&Schedule> for ScheduleRpc {
    fn from(s: &Schedule) -> Self {
        match s {
            Schedule::Ascending(a) => ScheduleRpc::Ascending {
                starting_bid: a.starting_bid.to_string(),
                min_bid_delta: a.min_bid_delta.to_string(),
                deadline: a.deadline,
                deadline_extension: a.deadline_extension,
                highest_bid: a.highest_bid.to_string(),
            },
            Schedule::Sealed(v) => ScheduleRpc::Sealed {
                min_bid: v.min_bid.to_string(),
                commit_end: v.commit_end,
                reveal_end: v.reveal_end,
                commit_fee: v.commit_fee.to_string(),
                winning_bid: v.winning_bid.to_string(),
                accumulated_commit_fee: v.accumulated_commit_fee.to_string(),
            },
            Schedule::Descending(d) => ScheduleRpc::Descending {
                start_price: d.start_price.to_string(),
                min_price: d.min_price.to_string(),
                start_ts: d.start_ts,
                deadline: d.deadline,
                duration: d.duration,
                decay_factor: d.decay_factor,
                settle_price: d.settle_price.to_string(),
            },
        }
    }
}

impl From<&AuctionEvent> for EventRpc {
    fn from(e: &AuctionEvent) -> Self {
        match e {
            AuctionEvent::Created(c) => EventRpc::Created {
                auction_id: c.auction_id,
                kind: kind_name(c.kind).to_string(),
                auctioneer: hex::encode(c.auctioneer),
                deadline: c.deadline,
            },
            AuctionEvent::Bid(b) => EventRpc::Bid {
                auction_id: b.auction_id,
                bidder: hex::encode(b.bidder),
                amount: b.amount.to_string(),
                highest_bid: b.highest_bid.to_string(),
                deadline: b.deadline,
            },
            AuctionEvent::Committed(c) => EventRpc::Committed {
                auction_id: c.auction_id,
                bidder: hex::encode(c.bidder),
                commitment: hex::encode(c.commitment),
                fee: c.fee.to_string(),
            },
            AuctionEvent::Revealed(r) => EventRpc::Revealed {
                auction_id: r.auction_id,
                bidder: hex::encode(r.bidder),
                amount: r.amount.to_string(),
                winner: hex::encode(r.winner),
                winning_bid: r.winning_bid.to_string(),
            },
            AuctionEvent::Claimed(c) => EventRpc::Claimed {
                auction_id: c.auction_id,
                winner: hex::encode(c.winner),
                refund: c.refund.to_string(),
            },
            AuctionEvent::Withdrawn(w) => EventRpc::Withdrawn {
                auction_id: w.auction_id,
                auctioneer: hex::encode(w.auctioneer),
                proceeds: w.proceeds.to_string(),
                fee: w.fee.to_string(),
                commit_fees: w.commit_fees.to_string(),
            },
            AuctionEvent::Cancelled(c) => EventRpc::Cancelled {
                auction_id: c.auction_id,
                auctioneer: hex::encode(c.auctioneer),
            },
        }
    }
}
