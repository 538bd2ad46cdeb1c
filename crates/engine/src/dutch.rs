//! Reverse-Dutch engines: linearly and exponentially decaying asks.
//!
//! The ask starts at `start_price` and decays toward `min_price`; the first
//! bidder to accept pays the current ask, and the whole settlement (item
//! release plus proceeds split) happens inside that one transition. `Claim`
//! is reserved for the winner-settlement path; an unsold item goes back to
//! the auctioneer through `Cancel`, before or after the deadline.

use gavel_fixed::{mul_div, pow2_neg, ONE};
use gavel_types::events::{
    AuctionCancelled, AuctionCreated, AuctionEvent, BidPlaced, Claimed, Withdrawn,
};
use gavel_types::{
    AuctionKind, AuctionRecord, AuctionStatus, DescendingSchedule, Schedule,
};

use crate::call::CreateAuction;
use crate::context::{CallContext, ProtocolParams};
use crate::error::{AuctionError, EngineResult};
use crate::fees::fee_split;
use crate::gateway::{AssetGateway, Effect};
use crate::ledger::{run_transition, LedgerState, Transition};

/// Current ask for a descending schedule at time `now`.
///
/// Linear: `start - (start - min) * elapsed / duration`. Exponential:
/// `min + (start - min) * 2^(-elapsed * decay / DECAY_SCALE)` via the
/// fixed-point lookup. Clamped to `min_price` at or past the deadline.
pub fn current_price(sched: &DescendingSchedule, now: u64) -> u128 {
    if now >= sched.deadline {
        return sched.min_price;
    }
    let elapsed = now.saturating_sub(sched.start_ts) as u128;
    let span = sched.start_price - sched.min_price;
    match sched.decay_factor {
        None => sched.start_price - mul_div(span, elapsed, sched.duration as u128),
        Some(decay) => {
            let exponent = elapsed * decay as u128;
            sched.min_price + mul_div(span, pow2_neg(exponent), ONE)
        }
    }
}

/// Open a reverse-Dutch session and escrow the item.
pub fn handle_create(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    req: CreateAuction,
) -> EngineResult<Vec<AuctionEvent>> {
    req.validate_common(params)?;
    let (start_price, min_price, duration, decay_factor) = match req.params {
        crate::call::CreateParams::Descending {
            start_price,
            min_price,
            duration,
            decay_factor,
        } => (start_price, min_price, duration, decay_factor),
        _ => {
            return Err(AuctionError::InvalidArgument(
                "schedule parameters do not match auction kind",
            ))
        }
    };
    if start_price < min_price {
        return Err(AuctionError::InvalidArgument(
            "start price below min price",
        ));
    }
    if duration == 0 {
        return Err(AuctionError::InvalidArgument("duration must be positive"));
    }
    match (req.kind, decay_factor) {
        (AuctionKind::LinearReverseDutch, None) => {}
        (AuctionKind::ExpReverseDutch, Some(decay)) if decay > 0 => {}
        (AuctionKind::LinearReverseDutch, Some(_)) => {
            return Err(AuctionError::InvalidArgument(
                "decay factor not applicable to linear curve",
            ))
        }
        _ => {
            return Err(AuctionError::InvalidArgument(
                "positive decay factor required for exponential curve",
            ))
        }
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
            schedule: Schedule::Descending(DescendingSchedule {
                start_price,
                min_price,
                start_ts: ctx.now,
                deadline,
                duration,
                decay_factor,
                settle_price: min_price,
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

/// Accept the current ask: pay it, receive the item, settle immediately.
pub fn handle_bid(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        if record.is_claimed {
            return Err(AuctionError::AlreadyClaimed);
        }
        let sched = record
            .schedule
            .descending()
            .ok_or(AuctionError::Internal("descending schedule expected"))?;
        if ctx.now >= sched.deadline {
            return Err(AuctionError::DeadlineReached);
        }

        let price = current_price(sched, ctx.now);
        let (asset_kind, item_asset, item_value, pay_asset, auctioneer, fee_bps, deadline) = (
            record.asset_kind,
            record.item_asset,
            record.item_value,
            record.pay_asset,
            record.auctioneer,
            record.fee_bps_snapshot,
            sched.deadline,
        );

        let undo = tables.snapshot(auction_id, &[ctx.sender]);
        let record = tables.get_auction_mut(auction_id)?;
        record.winner = ctx.sender;
        record.is_claimed = true;
        record.status = AuctionStatus::Settled;
        // The proceeds split happens in this same transition, so owed funds
        // stay zero.
        record.available_funds = 0;
        record
            .schedule
            .descending_mut()
            .ok_or(AuctionError::Internal("descending schedule expected"))?
            .settle_price = price;

        let (proceeds, fee) = fee_split(price, fee_bps);
        Ok(Transition {
            undo,
            effects: vec![
                Effect::take_funds(pay_asset, ctx.sender, price),
                Effect::release(asset_kind, item_asset, ctx.sender, item_value),
                Effect::release_funds(pay_asset, auctioneer, proceeds),
                Effect::release_funds(pay_asset, params.treasury, fee),
            ],
            output: vec![
                AuctionEvent::Bid(BidPlaced {
                    auction_id,
                    bidder: ctx.sender,
                    amount: price,
                    highest_bid: price,
                    deadline,
                }),
                AuctionEvent::Claimed(Claimed {
                    auction_id,
                    winner: ctx.sender,
                    refund: 0,
                }),
                AuctionEvent::Withdrawn(Withdrawn {
                    auction_id,
                    auctioneer,
                    proceeds,
                    fee,
                    commit_fees: 0,
                }),
            ],
        })
    })
}

/// Winner-settlement only: the sale already released the item, so a sold
/// session answers `AlreadyClaimed` and an unsold one has nothing to claim.
pub fn handle_claim(
    state: &LedgerState,
    _gateway: &mut dyn AssetGateway,
    _ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    let tables = state.tables();
    let record = tables.get_auction(auction_id)?;
    if record.is_claimed {
        return Err(AuctionError::AlreadyClaimed);
    }
    Err(AuctionError::NotWinner)
}

/// Return an unsold item to the auctioneer, before or after the deadline.
pub fn handle_cancel(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    ctx: &CallContext,
    auction_id: u64,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        if ctx.sender != record.auctioneer {
            return Err(AuctionError::NotAuctioneer);
        }
        match record.status {
            AuctionStatus::Settled => return Err(AuctionError::HasBids),
            AuctionStatus::Cancelled => return Err(AuctionError::AlreadyClaimed),
            _ => {}
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
