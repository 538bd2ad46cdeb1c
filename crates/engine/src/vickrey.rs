//! Sealed-bid second-price engine (commit-reveal).
//!
//! Two clock-driven windows: commitments while `now < commit_end`, reveals
//! while `commit_end <= now < reveal_end`. A commitment is the digest of the
//! big-endian 32-byte amount concatenated with a 32-byte salt; the accepted
//! digest is fixed by configuration and exactly one scheme is honored.
//!
//! The record tracks the highest revealed bid through the winner's escrowed
//! tally and the second-highest through `winning_bid`, which starts at
//! `min_bid` so a sole revealer pays the reserve.

use gavel_types::events::{
    AuctionCancelled, AuctionCreated, AuctionEvent, BidCommitted, BidRevealed, Claimed, Withdrawn,
};
use gavel_types::{
    commitment_digest, AuctionRecord, AuctionStatus, Schedule, MIN_REVEAL_DURATION,
};

use crate::call::CreateAuction;
use crate::context::{CallContext, ProtocolParams};
use crate::error::{AuctionError, EngineResult};
use crate::fees::fee_split;
use crate::gateway::{AssetGateway, Effect};
use crate::ledger::{run_transition, LedgerState, Transition};

/// Open a sealed-bid session and escrow the item.
pub fn handle_create(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    req: CreateAuction,
) -> EngineResult<Vec<AuctionEvent>> {
    req.validate_common(params)?;
    let (min_bid, commit_duration, reveal_duration, commit_fee) = match req.params {
        crate::call::CreateParams::Sealed {
            min_bid,
            commit_duration,
            reveal_duration,
            commit_fee,
        } => (min_bid, commit_duration, reveal_duration, commit_fee),
        _ => {
            return Err(AuctionError::InvalidArgument(
                "schedule parameters do not match auction kind",
            ))
        }
    };
    if commit_duration == 0 {
        return Err(AuctionError::InvalidArgument(
            "commit duration must be positive",
        ));
    }
    if reveal_duration < MIN_REVEAL_DURATION {
        return Err(AuctionError::InvalidArgument("reveal window too short"));
    }
    let commit_end = ctx
        .now
        .checked_add(commit_duration)
        .ok_or(AuctionError::InvalidArgument("deadline overflows"))?;
    let reveal_end = commit_end
        .checked_add(reveal_duration)
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
            schedule: Schedule::Sealed(gavel_types::SealedSchedule {
                min_bid,
                commit_end,
                reveal_end,
                commit_fee,
                winning_bid: min_bid,
                accumulated_commit_fee: 0,
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
                deadline: reveal_end,
            })],
        })
    })
}

/// Store a commitment blob and escrow the commit fee.
pub fn handle_commit(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    ctx: &CallContext,
    auction_id: u64,
    commitment: [u8; 32],
    fee_amount: u128,
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        if record.status != AuctionStatus::Open {
            return Err(AuctionError::DeadlineReached);
        }
        let sched = record
            .schedule
            .sealed()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        if ctx.now >= sched.commit_end {
            return Err(AuctionError::DeadlineReached);
        }
        if ctx.sender == record.auctioneer {
            return Err(AuctionError::InvalidArgument(
                "auctioneer cannot bid on own auction",
            ));
        }
        if tables.commitments.contains_key(&(auction_id, ctx.sender)) {
            return Err(AuctionError::AlreadyCommitted);
        }
        if fee_amount != sched.commit_fee {
            return Err(AuctionError::CommitFeeMismatch {
                required: sched.commit_fee,
                got: fee_amount,
            });
        }

        let pay_asset = record.pay_asset;
        let commit_fee = sched.commit_fee;
        let new_accumulated = sched
            .accumulated_commit_fee
            .checked_add(commit_fee)
            .ok_or(AuctionError::InvalidArgument("commit fee overflow"))?;

        let undo = tables.snapshot(auction_id, &[ctx.sender]);
        tables.commitments.insert((auction_id, ctx.sender), commitment);
        tables
            .get_auction_mut(auction_id)?
            .schedule
            .sealed_mut()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?
            .accumulated_commit_fee = new_accumulated;

        Ok(Transition {
            undo,
            effects: vec![Effect::take_funds(pay_asset, ctx.sender, commit_fee)],
            output: vec![AuctionEvent::Committed(BidCommitted {
                auction_id,
                bidder: ctx.sender,
                commitment,
                fee: commit_fee,
            })],
        })
    })
}

/// Open a sealed bid, escrow its amount, and rank it.
pub fn handle_reveal(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    auction_id: u64,
    amount: u128,
    salt: [u8; 32],
) -> EngineResult<Vec<AuctionEvent>> {
    run_transition(state, gateway, |tables| {
        let record = tables.get_auction(auction_id)?;
        if record.status != AuctionStatus::Open && record.status != AuctionStatus::Revealing {
            return Err(AuctionError::DeadlineReached);
        }
        let sched = record
            .schedule
            .sealed()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        if ctx.now < sched.commit_end {
            return Err(AuctionError::BeforePhase);
        }
        if ctx.now >= sched.reveal_end {
            return Err(AuctionError::DeadlineReached);
        }
        let commitment = tables
            .commitments
            .get(&(auction_id, ctx.sender))
            .copied()
            .ok_or(AuctionError::NotCommitted)?;
        if commitment_digest(params.commitment_scheme, amount, &salt) != commitment {
            return Err(AuctionError::InvalidReveal);
        }

        let pay_asset = record.pay_asset;
        let auctioneer = record.auctioneer;
        let commit_fee = sched.commit_fee;
        let min_bid = sched.min_bid;
        let winning_bid = sched.winning_bid;
        let prev_winner = record.winner;
        let prev_high = tables.bid_tally(auction_id, &prev_winner);
        // The fee was added at commit time; failing here would mean the
        // commitment entry and the accumulator disagree.
        let new_accumulated = sched
            .accumulated_commit_fee
            .checked_sub(commit_fee)
            .ok_or(AuctionError::Internal("commit fee accounting underflow"))?;

        let undo = tables.snapshot(auction_id, &[ctx.sender, prev_winner]);
        tables.commitments.remove(&(auction_id, ctx.sender));

        let mut effects = vec![Effect::take_funds(pay_asset, ctx.sender, amount)];
        if amount >= min_bid && amount > prev_high {
            // New highest reveal: the displaced leader is made whole and the
            // old highest becomes the price the winner will pay.
            if prev_high > 0 && prev_winner != auctioneer && prev_winner != ctx.sender {
                effects.push(Effect::release_funds(pay_asset, prev_winner, prev_high));
                tables.set_bid(auction_id, prev_winner, 0);
            }
            let second = winning_bid.max(prev_high);
            tables.set_bid(auction_id, ctx.sender, amount);
            let record = tables.get_auction_mut(auction_id)?;
            record.winner = ctx.sender;
            record.available_funds = second;
            record.status = AuctionStatus::Revealing;
            record
                .schedule
                .sealed_mut()
                .ok_or(AuctionError::Internal("sealed schedule expected"))?
                .winning_bid = second;
        } else if amount > winning_bid {
            // New second-highest: only the price moves; the payment goes
            // straight back.
            effects.push(Effect::release_funds(pay_asset, ctx.sender, amount));
            let record = tables.get_auction_mut(auction_id)?;
            record.available_funds = amount;
            record.status = AuctionStatus::Revealing;
            record
                .schedule
                .sealed_mut()
                .ok_or(AuctionError::Internal("sealed schedule expected"))?
                .winning_bid = amount;
        } else {
            // Neither top nor runner-up.
            effects.push(Effect::release_funds(pay_asset, ctx.sender, amount));
            tables.get_auction_mut(auction_id)?.status = AuctionStatus::Revealing;
        }

        // The reveal earns the commit fee back.
        effects.push(Effect::release_funds(pay_asset, ctx.sender, commit_fee));
        let record = tables.get_auction_mut(auction_id)?;
        let sched = record
            .schedule
            .sealed_mut()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        sched.accumulated_commit_fee = new_accumulated;
        let out_winning_bid = sched.winning_bid;
        let out_winner = record.winner;

        Ok(Transition {
            undo,
            effects,
            output: vec![AuctionEvent::Revealed(BidRevealed {
                auction_id,
                bidder: ctx.sender,
                amount,
                winner: out_winner,
                winning_bid: out_winning_bid,
            })],
        })
    })
}

/// Release the item to the winner and refund the overpayment above the
/// second price.
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
            .sealed()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        if record.status != AuctionStatus::Cancelled && ctx.now < sched.reveal_end {
            return Err(AuctionError::BeforePhase);
        }
        if ctx.sender != record.winner {
            return Err(AuctionError::NotWinner);
        }
        if record.is_claimed {
            return Err(AuctionError::AlreadyClaimed);
        }

        let (asset_kind, item_asset, item_value, pay_asset, winner) = (
            record.asset_kind,
            record.item_asset,
            record.item_value,
            record.pay_asset,
            record.winner,
        );
        let winning_bid = sched.winning_bid;
        let revealed = tables.bid_tally(auction_id, &winner);
        // The winner's escrowed reveal covers the second price; the rest goes
        // back. An auctioneer winner means no valid reveal happened.
        let refund = if revealed == 0 {
            0
        } else {
            revealed
                .checked_sub(winning_bid)
                .ok_or(AuctionError::Internal("revealed below winning bid"))?
        };

        let undo = tables.snapshot(auction_id, &[winner]);
        tables.set_bid(auction_id, winner, 0);
        let record = tables.get_auction_mut(auction_id)?;
        record.is_claimed = true;
        record.status = AuctionStatus::Settled;

        Ok(Transition {
            undo,
            effects: vec![
                Effect::release_funds(pay_asset, winner, refund),
                Effect::release(asset_kind, item_asset, winner, item_value),
            ],
            output: vec![AuctionEvent::Claimed(Claimed {
                auction_id,
                winner,
                refund,
            })],
        })
    })
}

/// Pay out the second price minus the fee cut, plus forfeited commit fees.
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
            .sealed()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        if record.status != AuctionStatus::Cancelled && ctx.now < sched.reveal_end {
            return Err(AuctionError::BeforePhase);
        }
        if ctx.sender != record.auctioneer {
            return Err(AuctionError::NotAuctioneer);
        }

        let funds = record.available_funds;
        let forfeited = sched.accumulated_commit_fee;
        let pay_asset = record.pay_asset;
        let auctioneer = record.auctioneer;
        let fee_bps = record.fee_bps_snapshot;

        let undo = tables.snapshot(auction_id, &[]);
        // Both owed pots are zeroed strictly before any transfer.
        let record = tables.get_auction_mut(auction_id)?;
        record.available_funds = 0;
        record
            .schedule
            .sealed_mut()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?
            .accumulated_commit_fee = 0;

        let (proceeds, fee) = fee_split(funds, fee_bps);
        Ok(Transition {
            undo,
            effects: vec![
                Effect::release_funds(pay_asset, auctioneer, proceeds),
                Effect::release_funds(pay_asset, params.treasury, fee),
                Effect::release_funds(pay_asset, auctioneer, forfeited),
            ],
            output: vec![AuctionEvent::Withdrawn(Withdrawn {
                auction_id,
                auctioneer,
                proceeds,
                fee,
                commit_fees: forfeited,
            })],
        })
    })
}

/// Abort a session nobody has committed to.
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
            .sealed()
            .ok_or(AuctionError::Internal("sealed schedule expected"))?;
        if ctx.sender != record.auctioneer {
            return Err(AuctionError::NotAuctioneer);
        }
        if record.status == AuctionStatus::Cancelled {
            return Err(AuctionError::AlreadyClaimed);
        }
        if ctx.now >= sched.reveal_end {
            return Err(AuctionError::DeadlineReached);
        }
        // Any outstanding commitment, or a reveal already folded in, blocks
        // cancellation: fees have been paid.
        if tables.has_commitments(auction_id) || record.status != AuctionStatus::Open {
            return Err(AuctionError::CommitmentsExist);
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
