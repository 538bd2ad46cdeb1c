//! Ascending-bid engines: English and all-pay.
//!
//! Both share the schedule, the soft-close deadline extension, and the
//! settlement path. They differ only in what happens to an outbid leader:
//! English returns the previous leader's full tally, all-pay retains every
//! payment and accumulates it into the auctioneer's proceeds.

use gavel_types::events::{
    AuctionCancelled, AuctionCreated, AuctionEvent, BidPlaced, Claimed, Withdrawn,
};
use gavel_types::{AuctionKind, AuctionRecord, AuctionStatus, Principal, Schedule};

use crate::call::CreateAuction;
use crate::context::{CallContext, ProtocolParams};
use crate::error::{AuctionError, EngineResult};
use crate::fees::fee_split;
use crate::gateway::{AssetGateway, Effect};
use crate::ledger::{run_transition, LedgerState, Transition};

/// Open an English or all-pay session and escrow the item.
pub fn handle_create(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    req: CreateAuction,
) -> EngineResult<Vec<AuctionEvent>> {
    req.validate_common(params)?;
    let (starting_bid, min_bid_delta, duration, deadline_extension) = match req.params {
        crate::call::CreateParams::Ascending {
            starting_bid,
            min_bid_delta,
            duration,
            deadline_extension,
        } => (starting_bid, min_bid_delta, duration, deadline_extension),
        _ => {
            return Err(AuctionError::InvalidArgument(
                "schedule parameters do not match auction kind",
            ))
        }
    };
    if duration == 0 {
        return Err(AuctionError::InvalidArgument("duration must be positive"));
    }
    let deadline = ctx
        .now
        .checked_add(duration)
        .ok_or(AuctionError::InvalidArgument("deadline overflows"))?;

    run_transition(state, gateway, |tables| {
        let undo = tables.snapshot(tables.next_auction_id, &[]);
        let id = tables.allocate_auction_id();
        let record = AuctionRecord {
            id,
            kind: req.kind,
            name: req.name.clone(),
            asset_kind: req.asset_kind,
            auctioneer: ctx.sender,
            item_asset: req.asset_id,
            item_value: req.id_or_amount,
            pay_asset: req.pay_asset,
            schedule: Schedule::Ascending(gavel_types::AscendingSchedule {
                starting_bid,
                min_bid_delta,
                deadline,
                deadline_extension,
                highest_bid: 0,
            }),
            status: AuctionStatus::Open,
            winner: ctx.sender,
            available_funds: 0,
            is_claimed: false,
            fee_bps_snapshot: params.fee_bps,
            created_at: ctx.now,
        };
        tables.auctions.insert(id, record);

        Ok(Transition {
            undo,
            effects: vec![Effect::take(
                req.asset_kind,
                req.asset_id,
                ctx.sender,
                req.id_or_amount,
            )],
            output: vec![AuctionEvent::Created(AuctionCreated {
                auction_id: id,
                kind: req.kind,
                auctioneer: ctx.sender,
                item_asset: req.asset_id,
                item_value: req.id_or_amount,
                pay_asset: req.pay_asset,
                deadline,
            })],
        })
    })
}

/// Place a bid of `delta` payment units on top of the caller's tally.
pub fn handle_bid(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    ctx: &CallContext,
    auction_id: u64,
    amount: Option<u128>,
) -> EngineResult<Vec<AuctionEvent>> {
    let delta = amount.ok_or(AuctionError::AmountNonPositive)?;
    if delta == 0 {
        return Err(AuctionError::AmountNonPositive);
    }

    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        if record.status != AuctionStatus::Open {
            return Err(AuctionError::DeadlineReached);
        }
        let sched = record
            .schedule
            .ascending()
            .ok_or(AuctionError::Internal("ascending schedule expected"))?;
        if ctx.now >= sched.deadline {
            return Err(AuctionError::DeadlineReached);
        }

        let tally = tables.bid_tally(auction_id, &ctx.sender);
        let new_tally = tally
            .checked_add(delta)
            .ok_or(AuctionError::InvalidArgument("bid tally overflows"))?;
        if sched.highest_bid == 0 {
            if new_tally < sched.starting_bid {
                return Err(AuctionError::FirstBidBelowStart {
                    required: sched.starting_bid,
                    got: new_tally,
                });
            }
        } else {
            let required = sched
                .highest_bid
                .checked_add(sched.min_bid_delta)
                .ok_or(AuctionError::InvalidArgument("bid floor overflows"))?;
            if new_tally < required {
                return Err(AuctionError::BidTooLow {
                    required,
                    got: new_tally,
                });
            }
        }

        let kind = record.kind;
        let pay_asset = record.pay_asset;
        let auctioneer = record.auctioneer;
        let had_bids = sched.highest_bid > 0;
        let prev_winner = record.winner;
        let prev_tally = tables.bid_tally(auction_id, &prev_winner);
        // All fallible arithmetic happens before the first mutation; the
        // closure must not fail once the tables have been touched.
        let new_available = match kind {
            AuctionKind::English => new_tally,
            AuctionKind::AllPay => record
                .available_funds
                .checked_add(delta)
                .ok_or(AuctionError::InvalidArgument("proceeds overflow"))?,
            _ => return Err(AuctionError::Internal("ascending kind expected")),
        };

        let undo = tables.snapshot(auction_id, &[ctx.sender, prev_winner]);
        let mut effects = vec![Effect::take_funds(pay_asset, ctx.sender, delta)];

        // A leader raising their own bid keeps their tally; only a displaced
        // third party is made whole.
        let refund_prev = kind == AuctionKind::English
            && had_bids
            && prev_winner != auctioneer
            && prev_winner != ctx.sender
            && prev_tally > 0;
        if refund_prev {
            effects.push(Effect::release_funds(pay_asset, prev_winner, prev_tally));
            tables.set_bid(auction_id, prev_winner, 0);
        }
        tables.set_bid(auction_id, ctx.sender, new_tally);

        let record = tables.get_auction_mut(auction_id)?;
        record.available_funds = new_available;
        record.winner = ctx.sender;
        let sched = record
            .schedule
            .ascending_mut()
            .ok_or(AuctionError::Internal("ascending schedule expected"))?;
        sched.highest_bid = new_tally;
        sched.deadline = sched.deadline.saturating_add(sched.deadline_extension);
        let deadline = sched.deadline;

        Ok(Transition {
            undo,
            effects,
            output: vec![AuctionEvent::Bid(BidPlaced {
                auction_id,
                bidder: ctx.sender,
                amount: delta,
                highest_bid: new_tally,
                deadline,
            })],
        })
    })
}

/// Release the item to the winner after the deadline.
pub fn handle_claim(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        let sched = record
            .schedule
            .ascending()
            .ok_or(AuctionError::Internal("ascending schedule expected"))?;
        if record.status == AuctionStatus::Open && ctx.now < sched.deadline {
            return Err(AuctionError::BeforePhase);
        }
        if ctx.sender != record.winner {
            return Err(AuctionError::NotWinner);
        }
        if record.is_claimed {
            return Err(AuctionError::AlreadyClaimed);
        }

        let (asset_kind, item_asset, item_value, winner) = (
            record.asset_kind,
            record.item_asset,
            record.item_value,
            record.winner,
        );
        let undo = tables.snapshot(auction_id, &[]);
        let record = tables.get_auction_mut(auction_id)?;
        record.is_claimed = true;
        record.status = AuctionStatus::Settled;

        Ok(Transition {
            undo,
            effects: vec![Effect::release(asset_kind, item_asset, winner, item_value)],
            output: vec![AuctionEvent::Claimed(Claimed {
                auction_id,
                winner,
                refund: 0,
            })],
        })
    })
}

/// Pay out proceeds to the auctioneer and the fee cut to the treasury.
pub fn handle_withdraw(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        let sched = record
            .schedule
            .ascending()
            .ok_or(AuctionError::Internal("ascending schedule expected"))?;
        if record.status == AuctionStatus::Open && ctx.now < sched.deadline {
            return Err(AuctionError::BeforePhase);
        }
        if ctx.sender != record.auctioneer {
            return Err(AuctionError::NotAuctioneer);
        }

        let funds = record.available_funds;
        let pay_asset = record.pay_asset;
        let auctioneer = record.auctioneer;
        let fee_bps = record.fee_bps_snapshot;

        // Every escrowed tally is drained by this payout.
        let payers: Vec<Principal> = tables
            .bids
            .keys()
            .filter(|(id, _)| *id == auction_id)
            .map(|(_, p)| *p)
            .collect();
        let undo = tables.snapshot(auction_id, &payers);

        // Owed funds are zeroed strictly before any transfer.
        tables.get_auction_mut(auction_id)?.available_funds = 0;
        for payer in &payers {
            tables.set_bid(auction_id, *payer, 0);
        }

        let (proceeds, fee) = fee_split(funds, fee_bps);
        Ok(Transition {
            undo,
            effects: vec![
                Effect::release_funds(pay_asset, auctioneer, proceeds),
                Effect::release_funds(pay_asset, params.treasury, fee),
            ],
            output: vec![AuctionEvent::Withdrawn(Withdrawn {
                auction_id,
                auctioneer,
                proceeds,
                fee,
                commit_fees: 0,
            })],
        })
    })
}

/// Abort a bid-less session and return the item.
pub fn handle_cancel(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        let sched = record
            .schedule
            .ascending()
            .ok_or(AuctionError::Internal("ascending schedule expected"))?;
        if ctx.sender != record.auctioneer {
            return Err(AuctionError::NotAuctioneer);
        }
        if record.status != AuctionStatus::Open {
            return Err(AuctionError::AlreadyClaimed);
        }
        if ctx.now >= sched.deadline {
            return Err(AuctionError::DeadlineReached);
        }
        if record.winner != record.auctioneer {
            return Err(AuctionError::HasBids);
        }

        let (asset_kind, item_asset, item_value, auctioneer) = (
            record.asset_kind,
            record.item_asset,
            record.item_value,
            record.auctioneer,
        );
        let undo = tables.snapshot(auction_id, &[]);
        let record = tables.get_auction_mut(auction_id)?;
        record.status = AuctionStatus::Cancelled;
        record.is_claimed = true;

        Ok(Transition {
            undo,
            effects: vec![Effect::release(
                asset_kind,
                item_asset,
                auctioneer,
                item_value,
            )],
            output: vec![AuctionEvent::Cancelled(AuctionCancelled {
                auction_id,
                auctioneer,
            })],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CreateAuction, CreateParams};
    use crate::testutil::*;
    use gavel_types::{AssetKind, AuctionKind, FIXED_ONE};

    fn create_req(kind: AuctionKind) -> CreateAuction {
        CreateAuction {
            kind,
            name: "lot #1".to_string(),
            asset_kind: AssetKind::Unique,
            asset_id: ITEM_ASSET,
            id_or_amount: 1,
            pay_asset: PAY_ASSET,
            params: CreateParams::Ascending {
                starting_bid: FIXED_ONE,
                min_bid_delta: FIXED_ONE / 10,
                duration: 5,
                deadline_extension: 10,
            },
        }
    }

    fn setup(kind: AuctionKind) -> (LedgerState, RecordingGateway, u64) {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        let events = handle_create(
            &state,
            &mut gateway,
            &params(),
            &ctx(AUCTIONEER, 100),
            create_req(kind),
        )
        .unwrap();
        let id = events[0].auction_id();
        (state, gateway, id)
    }

    #[test]
    fn test_create_escrows_item() {
        let (state, gateway, id) = setup(AuctionKind::English);
        assert_eq!(id, 1);
        assert_eq!(gateway.item_transfers(&ITEM_ASSET), 1);

        let tables = state.tables();
        let record = tables.get_auction(id).unwrap();
        assert_eq!(record.winner, AUCTIONEER);
        assert_eq!(record.fee_bps_snapshot, 100);
        assert_eq!(record.schedule.ascending().unwrap().deadline, 105);
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        let mut req = create_req(AuctionKind::English);
        req.name.clear();
        let err = handle_create(&state, &mut gateway, &params(), &ctx(AUCTIONEER, 100), req)
            .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidArgument(_)));
        assert!(state.tables().auctions.is_empty());
    }

    #[test]
    fn test_create_rejects_zero_duration() {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        let mut req = create_req(AuctionKind::English);
        req.params = CreateParams::Ascending {
            starting_bid: FIXED_ONE,
            min_bid_delta: 0,
            duration: 0,
            deadline_extension: 0,
        };
        let err = handle_create(&state, &mut gateway, &params(), &ctx(AUCTIONEER, 100), req)
            .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidArgument(_)));
    }

    #[test]
    fn test_first_bid_at_start_accepted() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();

        let tables = state.tables();
        let record = tables.get_auction(id).unwrap();
        assert_eq!(record.winner, ALICE);
        assert_eq!(record.available_funds, FIXED_ONE);
        // Soft close pushed the deadline out.
        assert_eq!(record.schedule.ascending().unwrap().deadline, 115);
    }

    #[test]
    fn test_first_bid_below_start_rejected() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        let err = handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE - 1))
            .unwrap_err();
        assert!(matches!(err, AuctionError::FirstBidBelowStart { .. }));
    }

    #[test]
    fn test_outbid_leader_is_refunded() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        handle_bid(
            &state,
            &mut gateway,
            &ctx(BOB, 102),
            id,
            Some(12 * FIXED_ONE / 10),
        )
        .unwrap();

        assert_eq!(gateway.net_funds(&PAY_ASSET, &ALICE), 0);
        let tables = state.tables();
        assert_eq!(tables.bid_tally(id, &ALICE), 0);
        assert_eq!(tables.bid_tally(id, &BOB), 12 * FIXED_ONE / 10);
        assert_eq!(
            tables.get_auction(id).unwrap().available_funds,
            12 * FIXED_ONE / 10
        );
    }

    #[test]
    fn test_bid_exactly_at_floor_accepted() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        // highest + delta exactly.
        handle_bid(
            &state,
            &mut gateway,
            &ctx(BOB, 102),
            id,
            Some(11 * FIXED_ONE / 10),
        )
        .unwrap();
        assert_eq!(state.tables().get_auction(id).unwrap().winner, BOB);
    }

    #[test]
    fn test_bid_below_floor_rejected() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        let err = handle_bid(
            &state,
            &mut gateway,
            &ctx(BOB, 102),
            id,
            Some(FIXED_ONE / 100),
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::BidTooLow { .. }));
    }

    #[test]
    fn test_self_raise_keeps_tally() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        handle_bid(
            &state,
            &mut gateway,
            &ctx(ALICE, 102),
            id,
            Some(FIXED_ONE / 10),
        )
        .unwrap();

        let tables = state.tables();
        assert_eq!(tables.bid_tally(id, &ALICE), 11 * FIXED_ONE / 10);
        assert_eq!(
            tables.get_auction(id).unwrap().available_funds,
            11 * FIXED_ONE / 10
        );
        // No refund was issued.
        assert_eq!(
            gateway.net_funds(&PAY_ASSET, &ALICE),
            -(11 * FIXED_ONE as i128 / 10)
        );
    }

    #[test]
    fn test_bid_after_deadline_rejected() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        let err =
            handle_bid(&state, &mut gateway, &ctx(ALICE, 105), id, Some(FIXED_ONE)).unwrap_err();
        assert_eq!(err, AuctionError::DeadlineReached);
    }

    #[test]
    fn test_all_pay_retains_every_delta() {
        let (state, mut gateway, id) = setup(AuctionKind::AllPay);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        handle_bid(
            &state,
            &mut gateway,
            &ctx(BOB, 102),
            id,
            Some(12 * FIXED_ONE / 10),
        )
        .unwrap();
        handle_bid(
            &state,
            &mut gateway,
            &ctx(ALICE, 103),
            id,
            Some(5 * FIXED_ONE / 10),
        )
        .unwrap();

        let tables = state.tables();
        let record = tables.get_auction(id).unwrap();
        // A's cumulative 1.5e18 beats B's 1.2e18.
        assert_eq!(record.winner, ALICE);
        assert_eq!(record.available_funds, 27 * FIXED_ONE / 10);
        assert_eq!(tables.bid_tally(id, &ALICE), 15 * FIXED_ONE / 10);
        assert_eq!(tables.bid_tally(id, &BOB), 12 * FIXED_ONE / 10);
        // Nobody was refunded.
        assert_eq!(
            gateway.net_funds(&PAY_ASSET, &BOB),
            -(12 * FIXED_ONE as i128 / 10)
        );
    }

    #[test]
    fn test_claim_and_withdraw_after_deadline() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        handle_bid(
            &state,
            &mut gateway,
            &ctx(BOB, 102),
            id,
            Some(12 * FIXED_ONE / 10),
        )
        .unwrap();

        // Deadline is 125 after two extensions.
        let err = handle_claim(&state, &mut gateway, &ctx(BOB, 120), id).unwrap_err();
        assert_eq!(err, AuctionError::BeforePhase);

        handle_claim(&state, &mut gateway, &ctx(BOB, 130), id).unwrap();
        assert_eq!(gateway.item_transfers(&ITEM_ASSET), 2);

        let err = handle_claim(&state, &mut gateway, &ctx(BOB, 131), id).unwrap_err();
        assert_eq!(err, AuctionError::AlreadyClaimed);

        let events =
            handle_withdraw(&state, &mut gateway, &params(), &ctx(AUCTIONEER, 132), id).unwrap();
        match &events[0] {
            AuctionEvent::Withdrawn(w) => {
                assert_eq!(w.proceeds, 1_188_000_000_000_000_000);
                assert_eq!(w.fee, 12_000_000_000_000_000);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(state.tables().get_auction(id).unwrap().available_funds, 0);
        assert_eq!(state.tables().bid_tally(id, &BOB), 0);
    }

    #[test]
    fn test_withdraw_requires_auctioneer() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        let err = handle_withdraw(&state, &mut gateway, &params(), &ctx(ALICE, 200), id)
            .unwrap_err();
        assert_eq!(err, AuctionError::NotAuctioneer);
    }

    #[test]
    fn test_claim_requires_winner() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        let err = handle_claim(&state, &mut gateway, &ctx(BOB, 200), id).unwrap_err();
        assert_eq!(err, AuctionError::NotWinner);
    }

    #[test]
    fn test_cancel_before_bids() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_cancel(&state, &mut gateway, &ctx(AUCTIONEER, 101), id).unwrap();
        assert_eq!(gateway.item_transfers(&ITEM_ASSET), 2);
        assert_eq!(
            state.tables().get_auction(id).unwrap().status,
            AuctionStatus::Cancelled
        );

        // Cancelled session no longer accepts bids.
        let err =
            handle_bid(&state, &mut gateway, &ctx(ALICE, 102), id, Some(FIXED_ONE)).unwrap_err();
        assert_eq!(err, AuctionError::DeadlineReached);
    }

    #[test]
    fn test_cancel_with_bids_rejected() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        handle_bid(&state, &mut gateway, &ctx(ALICE, 101), id, Some(FIXED_ONE)).unwrap();
        let err = handle_cancel(&state, &mut gateway, &ctx(AUCTIONEER, 102), id).unwrap_err();
        assert_eq!(err, AuctionError::HasBids);
    }

    #[test]
    fn test_escrow_failure_rolls_back_bid() {
        let (state, _, id) = setup(AuctionKind::English);
        let mut failing = RecordingGateway::failing_at(0);
        let err = handle_bid(&state, &mut failing, &ctx(ALICE, 101), id, Some(FIXED_ONE))
            .unwrap_err();
        assert!(matches!(err, AuctionError::EscrowFailed(_)));

        let tables = state.tables();
        let record = tables.get_auction(id).unwrap();
        assert_eq!(record.winner, AUCTIONEER);
        assert_eq!(record.available_funds, 0);
        assert_eq!(record.schedule.ascending().unwrap().highest_bid, 0);
        assert_eq!(tables.bid_tally(id, &ALICE), 0);
    }

    #[test]
    fn test_deadline_never_decreases() {
        let (state, mut gateway, id) = setup(AuctionKind::English);
        let mut last = 0u64;
        // Alternating bidders refund each other, so each delta must clear the
        // previous highest plus the step on its own.
        let bids = [FIXED_ONE, 11 * FIXED_ONE / 10, 12 * FIXED_ONE / 10];
        for (i, total) in bids.iter().enumerate() {
            let bidder = if i % 2 == 0 { ALICE } else { BOB };
            handle_bid(
                &state,
                &mut gateway,
                &ctx(bidder, 101 + i as u64),
                id,
                Some(*total),
            )
            .unwrap();
            let deadline = state
                .tables()
                .get_auction(id)
                .unwrap()
                .schedule
                .ascending()
                .unwrap()
                .deadline;
            assert!(deadline >= last);
            last = deadline;
        }
    }
}
