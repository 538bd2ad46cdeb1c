//! Request routing.
//!
//! The dispatcher resolves the auction record, matches the operation against
//! the session's kind, and hands off to the engine. It performs no state
//! mutation itself; a request whose shape does not fit the kind is answered
//! with `KindMismatch` before any engine code runs.

use gavel_types::events::AuctionEvent;
use gavel_types::AuctionKind;
use tracing::debug;

use crate::ascending;
use crate::call::AuctionCall;
use crate::context::{CallContext, ProtocolParams};
use crate::dutch;
use crate::error::{AuctionError, EngineResult};
use crate::gateway::AssetGateway;
use crate::ledger::LedgerState;
use crate::vickrey;

/// Route one typed request to the engine matching the auction's kind.
///
/// Returns the ordered list of events the transition produced; a
/// reverse-Dutch sale yields its full settlement sequence in one call.
pub fn dispatch(
    state: &LedgerState,
    gateway: &mut dyn AssetGateway,
    params: &ProtocolParams,
    ctx: &CallContext,
    call: AuctionCall,
) -> EngineResult<Vec<AuctionEvent>> {
    match call {
        AuctionCall::Create(req) => {
            debug!(kind = ?req.kind, "create auction");
            match req.kind {
                AuctionKind::English | AuctionKind::AllPay => {
                    ascending::handle_create(state, gateway, params, ctx, req)
                }
                AuctionKind::Vickrey => vickrey::handle_create(state, gateway, params, ctx, req),
                AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
                    dutch::handle_create(state, gateway, params, ctx, req)
                }
            }
        }

        AuctionCall::Bid { auction_id, amount } => {
            debug!(auction_id, "bid");
            match kind_of(state, auction_id)? {
                AuctionKind::English | AuctionKind::AllPay => {
                    ascending::handle_bid(state, gateway, ctx, auction_id, amount)
                }
                AuctionKind::Vickrey => Err(AuctionError::KindMismatch),
                AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
                    // The engine computes the ask; a supplied amount is a
                    // malformed request, not a price suggestion.
                    if amount.is_some() {
                        return Err(AuctionError::InvalidArgument(
                            "reverse-Dutch bids carry no amount",
                        ));
                    }
                    dutch::handle_bid(state, gateway, params, ctx, auction_id)
                }
            }
        }

        AuctionCall::CommitBid {
            auction_id,
            commitment,
            fee_amount,
        } => {
            debug!(auction_id, "commit bid");
            match kind_of(state, auction_id)? {
                AuctionKind::Vickrey => {
                    vickrey::handle_commit(state, gateway, ctx, auction_id, commitment, fee_amount)
                }
                _ => Err(AuctionError::KindMismatch),
            }
        }

        AuctionCall::RevealBid {
            auction_id,
            amount,
            salt,
        } => {
            debug!(auction_id, "reveal bid");
            match kind_of(state, auction_id)? {
                AuctionKind::Vickrey => {
                    vickrey::handle_reveal(state, gateway, params, ctx, auction_id, amount, salt)
                }
                _ => Err(AuctionError::KindMismatch),
            }
        }

        AuctionCall::Claim { auction_id } => {
            debug!(auction_id, "claim");
            match kind_of(state, auction_id)? {
                AuctionKind::English | AuctionKind::AllPay => {
                    ascending::handle_claim(state, gateway, ctx, auction_id)
                }
                AuctionKind::Vickrey => vickrey::handle_claim(state, gateway, ctx, auction_id),
                AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
                    dutch::handle_claim(state, gateway, ctx, auction_id)
                }
            }
        }

        AuctionCall::Withdraw { auction_id } => {
            debug!(auction_id, "withdraw");
            match kind_of(state, auction_id)? {
                AuctionKind::English | AuctionKind::AllPay => {
                    ascending::handle_withdraw(state, gateway, params, ctx, auction_id)
                }
                AuctionKind::Vickrey => {
                    vickrey::handle_withdraw(state, gateway, params, ctx, auction_id)
                }
                // The proceeds split happened inside the sale transition.
                AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
                    Err(AuctionError::KindMismatch)
                }
            }
        }

        AuctionCall::Cancel { auction_id } => {
            debug!(auction_id, "cancel");
            match kind_of(state, auction_id)? {
                AuctionKind::English | AuctionKind::AllPay => {
                    ascending::handle_cancel(state, gateway, ctx, auction_id)
                }
                AuctionKind::Vickrey => vickrey::handle_cancel(state, gateway, ctx, auction_id),
                AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
                    dutch::handle_cancel(state, gateway, ctx, auction_id)
                }
            }
        }
    }
}

fn kind_of(state: &LedgerState, auction_id: u64) -> EngineResult<AuctionKind> {
    let tables = state.tables();
    tables.get_auction(auction_id).map(|record| record.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CreateAuction, CreateParams};
    use crate::testutil::*;
    use gavel_types::{AssetKind, FIXED_ONE};

    fn english_create() -> AuctionCall {
        AuctionCall::Create(CreateAuction {
            kind: AuctionKind::English,
            name: "lot".to_string(),
            asset_kind: AssetKind::Unique,
            asset_id: ITEM_ASSET,
            id_or_amount: 1,
            pay_asset: PAY_ASSET,
            params: CreateParams::Ascending {
                starting_bid: FIXED_ONE,
                min_bid_delta: FIXED_ONE / 10,
                duration: 100,
                deadline_extension: 0,
            },
        })
    }

    #[test]
    fn test_unknown_auction() {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        let err = dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(ALICE, 0),
            AuctionCall::Bid {
                auction_id: 42,
                amount: Some(1),
            },
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::UnknownAuction(42));
    }

    #[test]
    fn test_kind_mismatch_commit_against_english() {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(AUCTIONEER, 0),
            english_create(),
        )
        .unwrap();

        let err = dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(ALICE, 1),
            AuctionCall::CommitBid {
                auction_id: 1,
                commitment: [0u8; 32],
                fee_amount: 0,
            },
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::KindMismatch);

        let err = dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(ALICE, 1),
            AuctionCall::RevealBid {
                auction_id: 1,
                amount: 1,
                salt: [0u8; 32],
            },
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::KindMismatch);
    }

    #[test]
    fn test_dutch_bid_with_amount_rejected() {
        let state = LedgerState::new();
        let mut gateway = RecordingGateway::default();
        dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(AUCTIONEER, 0),
            AuctionCall::Create(CreateAuction {
                kind: AuctionKind::LinearReverseDutch,
                name: "lot".to_string(),
                asset_kind: AssetKind::Unique,
                asset_id: ITEM_ASSET,
                id_or_amount: 1,
                pay_asset: PAY_ASSET,
                params: CreateParams::Descending {
                    start_price: 10 * FIXED_ONE,
                    min_price: FIXED_ONE,
                    duration: 100,
                    decay_factor: None,
                },
            }),
        )
        .unwrap();

        let err = dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(ALICE, 10),
            AuctionCall::Bid {
                auction_id: 1,
                amount: Some(FIXED_ONE),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::InvalidArgument(_)));

        let err = dispatch(
            &state,
            &mut gateway,
            &params(),
            &ctx(AUCTIONEER, 10),
            AuctionCall::Withdraw { auction_id: 1 },
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::KindMismatch);
    }
}
