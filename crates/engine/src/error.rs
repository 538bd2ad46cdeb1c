//! Engine error taxonomy.

use thiserror::Error;

/// Errors returned by auction operations.
///
/// Validation errors never mutate state. `EscrowFailed` is returned after the
/// in-memory transition has been rolled back. `Internal` marks invariant
/// violations and is unreachable in a correct engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("auction not found: {0}")]
    UnknownAuction(u64),

    #[error("operation not supported for this auction kind")]
    KindMismatch,

    #[error("deadline reached")]
    DeadlineReached,

    #[error("phase not open yet")]
    BeforePhase,

    #[error("bid too low: need {required}, got {got}")]
    BidTooLow { required: u128, got: u128 },

    #[error("first bid below starting bid: need {required}, got {got}")]
    FirstBidBelowStart { required: u128, got: u128 },

    #[error("amount must be positive")]
    AmountNonPositive,

    #[error("caller is not the auctioneer")]
    NotAuctioneer,

    #[error("caller is not the winner")]
    NotWinner,

    #[error("already claimed")]
    AlreadyClaimed,

    #[error("commitment already submitted")]
    AlreadyCommitted,

    #[error("no commitment from caller")]
    NotCommitted,

    #[error("reveal does not match commitment")]
    InvalidReveal,

    #[error("commit fee mismatch: need {required}, got {got}")]
    CommitFeeMismatch { required: u128, got: u128 },

    #[error("auction has bids")]
    HasBids,

    #[error("commitments exist")]
    CommitmentsExist,

    #[error("escrow transfer failed: {0}")]
    EscrowFailed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, AuctionError>;
