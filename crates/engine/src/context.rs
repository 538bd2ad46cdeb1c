//! Per-call context and protocol parameters.

use gavel_types::{CommitmentScheme, Principal};

/// Context provided by the host for each call.
///
/// The sender is an opaque principal resolved by the auth layer; `now` is a
/// monotonic timestamp in seconds from the clock capability.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub sender: Principal,
    pub now: u64,
}

/// Read-only protocol parameters from the parameter source.
///
/// `fee_bps` is snapshotted into each record at creation so later changes do
/// not rewrite history; `treasury` and the commitment scheme are read at use.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolParams {
    /// Protocol fee in basis points of the auctioneer's gross proceeds.
    pub fee_bps: u16,
    /// Principal receiving the fee cut.
    pub treasury: Principal,
    /// Digest accepted for sealed-bid commitments.
    pub commitment_scheme: CommitmentScheme,
}
