//! Typed request messages accepted by the dispatcher.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use gavel_types::{is_null_asset, AssetId, AssetKind, AuctionKind, FEE_DENOMINATOR};

use crate::context::ProtocolParams;
use crate::error::{AuctionError, EngineResult};

/// Requests routed by the dispatcher.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionCall {
    /// Open a new auction session and escrow its item.
    Create(CreateAuction),

    /// Place a bid. `amount` is the delta for English/AllPay and must be
    /// omitted for reverse-Dutch, where the engine computes the ask.
    Bid {
        auction_id: u64,
        amount: Option<u128>,
    },

    /// Submit a sealed-bid commitment with its fee (Vickrey only).
    CommitBid {
        auction_id: u64,
        commitment: [u8; 32],
        fee_amount: u128,
    },

    /// Open a sealed bid (Vickrey only).
    RevealBid {
        auction_id: u64,
        amount: u128,
        salt: [u8; 32],
    },

    /// Release the item through the winner-settlement path.
    Claim { auction_id: u64 },

    /// Pay out proceeds to the auctioneer, fee to the treasury.
    Withdraw { auction_id: u64 },

    /// Abort the session and return the item to the auctioneer.
    Cancel { auction_id: u64 },
}

/// Creation request, shared by all auction kinds.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CreateAuction {
    pub kind: AuctionKind,
    pub name: String,
    pub asset_kind: AssetKind,
    pub asset_id: AssetId,
    /// Token id (Unique) or amount (Fungible) of the auctioned lot.
    pub id_or_amount: u128,
    pub pay_asset: AssetId,
    pub params: CreateParams,
}

impl CreateAuction {
    /// Checks shared by every kind's creation path.
    pub(crate) fn validate_common(&self, params: &ProtocolParams) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(AuctionError::InvalidArgument("name must not be empty"));
        }
        if is_null_asset(&self.pay_asset) {
            return Err(AuctionError::InvalidArgument("pay asset must be set"));
        }
        if params.fee_bps as u128 > FEE_DENOMINATOR {
            return Err(AuctionError::InvalidArgument("fee above denominator"));
        }
        Ok(())
    }
}

/// Per-kind creation parameters.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum CreateParams {
    /// English and AllPay.
    Ascending {
        starting_bid: u128,
        min_bid_delta: u128,
        duration: u64,
        deadline_extension: u64,
    },
    /// Vickrey.
    Sealed {
        min_bid: u128,
        commit_duration: u64,
        reveal_duration: u64,
        commit_fee: u128,
    },
    /// Reverse-Dutch; `decay_factor` must be present exactly when the kind
    /// is exponential.
    Descending {
        start_price: u128,
        min_price: u128,
        duration: u64,
        decay_factor: Option<u64>,
    },
}
