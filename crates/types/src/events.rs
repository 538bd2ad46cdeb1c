//! Events emitted by the engine on successful state transitions.
//!
//! Field order is fixed for external consumers; `borsh` serializes fields in
//! declaration order.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{AssetId, AuctionKind, Principal};

/// A new auction session was opened and its item escrowed.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionCreated {
    pub auction_id: u64,
    pub kind: AuctionKind,
    pub auctioneer: Principal,
    pub item_asset: AssetId,
    pub item_value: u128,
    pub pay_asset: AssetId,
    pub deadline: u64,
}

/// A bid was accepted. For reverse-Dutch auctions `amount` is the ask price
/// paid and `highest_bid` equals it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidPlaced {
    pub auction_id: u64,
    pub bidder: Principal,
    pub amount: u128,
    pub highest_bid: u128,
    pub deadline: u64,
}

/// A sealed-bid commitment was stored and its fee escrowed.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidCommitted {
    pub auction_id: u64,
    pub bidder: Principal,
    pub commitment: [u8; 32],
    pub fee: u128,
}

/// A sealed bid was opened and verified against its commitment.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidRevealed {
    pub auction_id: u64,
    pub bidder: Principal,
    pub amount: u128,
    pub winner: Principal,
    pub winning_bid: u128,
}

/// The item was released to the winner. `refund` is the sealed-bid
/// overpayment above the second price, zero for other kinds.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Claimed {
    pub auction_id: u64,
    pub winner: Principal,
    pub refund: u128,
}

/// Proceeds were paid out, minus the protocol fee.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Withdrawn {
    pub auction_id: u64,
    pub auctioneer: Principal,
    pub proceeds: u128,
    pub fee: u128,
    /// Forfeited commit fees from bidders who never revealed.
    pub commit_fees: u128,
}

/// The session was cancelled and the item returned to the auctioneer.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionCancelled {
    pub auction_id: u64,
    pub auctioneer: Principal,
}

/// Tagged union over all engine events.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionEvent {
    Created(AuctionCreated),
    Bid(BidPlaced),
    Committed(BidCommitted),
    Revealed(BidRevealed),
    Claimed(Claimed),
    Withdrawn(Withdrawn),
    Cancelled(AuctionCancelled),
}

impl AuctionEvent {
    /// The auction this event belongs to.
    pub fn auction_id(&self) -> u64 {
        match self {
            AuctionEvent::Created(e) => e.auction_id,
            AuctionEvent::Bid(e) => e.auction_id,
            AuctionEvent::Committed(e) => e.auction_id,
            AuctionEvent::Revealed(e) => e.auction_id,
            AuctionEvent::Claimed(e) => e.auction_id,
            AuctionEvent::Withdrawn(e) => e.auction_id,
            AuctionEvent::Cancelled(e) => e.auction_id,
        }
    }
}
