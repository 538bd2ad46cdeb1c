//! Auction table and per-bidder accounting.
//!
//! [`LedgerState`] owns two flat tables behind a `RefCell`: auctions by id,
//! and sparse per-bidder maps keyed `(auction_id, principal)`.
//! Engines mutate the tables under a scoped exclusive borrow, collect an
//! effect list, drop the borrow, and only then touch the asset gateway.
//! The `RefCell` turns any gateway re-entry under a live borrow into a
//! panic instead of silent double-entry; with the scoping below, re-entrant
//! calls instead observe the already-committed state.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use gavel_types::{AuctionRecord, Principal};

use crate::error::{AuctionError, EngineResult};
use crate::gateway::{run_effects, AssetGateway, Effect};

/// The flat state tables.
#[derive(Debug, Default)]
pub struct Tables {
    /// Next auction id to assign.
    pub next_auction_id: u64,

    /// All auctions by id; settled and cancelled records are retained.
    pub auctions: HashMap<u64, AuctionRecord>,

    /// Cumulative paid amount (English, AllPay) or revealed amount (Vickrey).
    pub bids: HashMap<(u64, Principal), u128>,

    /// Sealed-bid commitments; an entry is consumed by a successful reveal.
    pub commitments: HashMap<(u64, Principal), [u8; 32]>,
}

impl Tables {
    /// Get the next auction id and increment.
    pub fn allocate_auction_id(&mut self) -> u64 {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    pub fn get_auction(&self, auction_id: u64) -> EngineResult<&AuctionRecord> {
        self.auctions
            .get(&auction_id)
            .ok_or(AuctionError::UnknownAuction(auction_id))
    }

    pub fn get_auction_mut(&mut self, auction_id: u64) -> EngineResult<&mut AuctionRecord> {
        self.auctions
            .get_mut(&auction_id)
            .ok_or(AuctionError::UnknownAuction(auction_id))
    }

    /// Cumulative tally for a bidder, zero if absent.
    pub fn bid_tally(&self, auction_id: u64, bidder: &Principal) -> u128 {
        self.bids.get(&(auction_id, *bidder)).copied().unwrap_or(0)
    }

    /// Set a bidder's tally; zero removes the entry.
    pub fn set_bid(&mut self, auction_id: u64, bidder: Principal, value: u128) {
        if value == 0 {
            self.bids.remove(&(auction_id, bidder));
        } else {
            self.bids.insert((auction_id, bidder), value);
        }
    }

    /// Whether any unrevealed commitment exists for this auction.
    pub fn has_commitments(&self, auction_id: u64) -> bool {
        self.commitments.keys().any(|(id, _)| *id == auction_id)
    }

    /// Capture the pre-transition state touched by one operation: the record
    /// (possibly absent) plus the bid and commitment entries of the listed
    /// principals, and the id counter.
    pub fn snapshot(&self, auction_id: u64, principals: &[Principal]) -> Undo {
        Undo {
            next_auction_id: self.next_auction_id,
            auction_id,
            record: self.auctions.get(&auction_id).cloned(),
            bids: principals
                .iter()
                .map(|p| (*p, self.bids.get(&(auction_id, *p)).copied()))
                .collect(),
            commitments: principals
                .iter()
                .map(|p| (*p, self.commitments.get(&(auction_id, *p)).copied()))
                .collect(),
        }
    }

    /// Restore a snapshot, erasing the transition it was taken before.
    pub fn restore(&mut self, undo: Undo) {
        self.next_auction_id = undo.next_auction_id;
        match undo.record {
            Some(record) => {
                self.auctions.insert(undo.auction_id, record);
            }
            None => {
                self.auctions.remove(&undo.auction_id);
            }
        }
        for (principal, value) in undo.bids {
            match value {
                Some(v) => self.bids.insert((undo.auction_id, principal), v),
                None => self.bids.remove(&(undo.auction_id, principal)),
            };
        }
        for (principal, value) in undo.commitments {
            match value {
                Some(v) => self.commitments.insert((undo.auction_id, principal), v),
                None => self.commitments.remove(&(undo.auction_id, principal)),
            };
        }
    }
}

/// Pre-transition snapshot used to roll back a failed operation.
#[derive(Debug)]
pub struct Undo {
    next_auction_id: u64,
    auction_id: u64,
    record: Option<AuctionRecord>,
    bids: Vec<(Principal, Option<u128>)>,
    commitments: Vec<(Principal, Option<[u8; 32]>)>,
}

/// Owner of the state tables.
#[derive(Debug)]
pub struct LedgerState {
    tables: RefCell<Tables>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            tables: RefCell::new(Tables {
                next_auction_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Shared borrow of the tables for queries.
    pub fn tables(&self) -> Ref<'_, Tables> {
        self.tables.borrow()
    }

    /// Exclusive borrow of the tables. Must be dropped before any gateway
    /// call; `run_transition` enforces the scoping.
    pub fn tables_mut(&self) -> RefMut<'_, Tables> {
        self.tables.borrow_mut()
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a transition's in-memory phase.
pub struct Transition<T> {
    pub undo: Undo,
    pub effects: Vec<Effect>,
    pub output: T,
}

/// Run one operation: mutate the tables under a scoped borrow, then execute
/// the recorded effects. If the gateway refuses any effect the snapshot is
/// restored and the operation reports `EscrowFailed`, as if it never ran.
pub fn run_transition<T>(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    transition: impl FnOnce(&mut Tables) -> EngineResult<Transition<T>>,
) -> EngineResult<T> {
    let Transition {
        undo,
        effects,
        output,
    } = {
        let mut tables = state.tables_mut();
        transition(&mut tables)?
    };
    // Borrow released: the gateway may re-enter the engine and will observe
    // the already-transitioned state.
    if let Err(err) = run_effects(gateway, &effects) {
        tracing::warn!(%err, "escrow effect refused, rolling back transition");
        state.tables_mut().restore(undo);
        return Err(AuctionError::EscrowFailed(err.to_string()));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::{
        AscendingSchedule, AssetKind, AuctionKind, AuctionStatus, Schedule,
    };

    fn sample_record(id: u64) -> AuctionRecord {
        AuctionRecord {
            id,
            kind: AuctionKind::English,
            name: "sample".to_string(),
            asset_kind: AssetKind::Unique,
            auctioneer: [1u8; 32],
            item_asset: [2u8; 32],
            item_value: 1,
            pay_asset: [3u8; 32],
            schedule: Schedule::Ascending(AscendingSchedule {
                starting_bid: 100,
                min_bid_delta: 10,
                deadline: 1_000,
                deadline_extension: 10,
                highest_bid: 0,
            }),
            status: AuctionStatus::Open,
            winner: [1u8; 32],
            available_funds: 0,
            is_claimed: false,
            fee_bps_snapshot: 100,
            created_at: 0,
        }
    }

    #[test]
    fn test_allocate_auction_id() {
        let state = LedgerState::new();
        let mut tables = state.tables_mut();
        assert_eq!(tables.allocate_auction_id(), 1);
        assert_eq!(tables.allocate_auction_id(), 2);
        assert_eq!(tables.allocate_auction_id(), 3);
    }

    #[test]
    fn test_bid_tally_set_and_clear() {
        let state = LedgerState::new();
        let mut tables = state.tables_mut();
        let bidder = [9u8; 32];

        assert_eq!(tables.bid_tally(1, &bidder), 0);
        tables.set_bid(1, bidder, 50);
        assert_eq!(tables.bid_tally(1, &bidder), 50);
        tables.set_bid(1, bidder, 0);
        assert_eq!(tables.bid_tally(1, &bidder), 0);
        assert!(tables.bids.is_empty());
    }

    #[test]
    fn test_snapshot_restore_erases_mutation() {
        let state = LedgerState::new();
        let bidder = [9u8; 32];
        let mut tables = state.tables_mut();
        tables.auctions.insert(7, sample_record(7));
        tables.set_bid(7, bidder, 25);

        let undo = tables.snapshot(7, &[bidder]);
        tables.get_auction_mut(7).unwrap().available_funds = 99;
        tables.set_bid(7, bidder, 125);
        tables.commitments.insert((7, bidder), [4u8; 32]);

        tables.restore(undo);
        assert_eq!(tables.get_auction(7).unwrap().available_funds, 0);
        assert_eq!(tables.bid_tally(7, &bidder), 25);
        assert!(!tables.has_commitments(7));
    }

    #[test]
    fn test_snapshot_restore_removes_created_record() {
        let state = LedgerState::new();
        let mut tables = state.tables_mut();
        let undo = tables.snapshot(1, &[]);
        let id = tables.allocate_auction_id();
        tables.auctions.insert(id, sample_record(id));

        tables.restore(undo);
        assert!(tables.auctions.is_empty());
        assert_eq!(tables.next_auction_id, 1);
    }
}
