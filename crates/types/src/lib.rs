//! Core type definitions for the gavel auction engine.
//!
//! This crate provides the shared data structures used across the system:
//! auction records and per-kind schedules, the sealed-bid commitment
//! encoding, protocol constants, and the events emitted by the engine.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod events;

// =========================
// IDENTIFIERS
// =========================

/// Opaque principal identifier (32 bytes), resolved by the auth layer.
pub type Principal = [u8; 32];

/// Opaque asset identifier (32 bytes).
pub type AssetId = [u8; 32];

/// An asset id of all zeroes is treated as absent.
pub fn is_null_asset(asset: &AssetId) -> bool {
    asset.iter().all(|b| *b == 0)
}

// =========================
// CONSTANTS
// =========================

/// Basis-point denominator for the protocol fee.
pub const FEE_DENOMINATOR: u128 = 10_000;

/// One unit in 18-decimal fixed representation.
pub const FIXED_ONE: u128 = 1_000_000_000_000_000_000;

/// Scale of the exponential decay factor (5 decimals).
pub const DECAY_SCALE: u64 = 100_000;

/// Minimum sealed-bid reveal window, in seconds (one day plus one second).
pub const MIN_REVEAL_DURATION: u64 = 86_401;

// =========================
// AUCTION TYPES
// =========================

/// The five supported auction protocols.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionKind {
    /// Ascending-bid with refund of the outbid leader.
    English,
    /// Ascending-bid where every payment is retained.
    AllPay,
    /// Sealed-bid second-price with commit-reveal.
    Vickrey,
    /// Linearly decaying ask, first acceptor wins.
    LinearReverseDutch,
    /// Exponentially decaying ask, first acceptor wins.
    ExpReverseDutch,
}

/// Whether the auctioned asset is a unique item or a fungible amount.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AssetKind {
    Unique,
    Fungible,
}

/// Auction lifecycle status.
///
/// `Settled` and `Cancelled` are terminal; records are retained read-only.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionStatus {
    /// Accepting bids (for sealed-bid: the commit window).
    Open,
    /// Sealed-bid reveal window, entered on the first successful reveal.
    Revealing,
    /// Item released through the winner-settlement path.
    Settled,
    /// Item returned to the auctioneer.
    Cancelled,
}

// =========================
// SCHEDULES
// =========================

/// Timing and pricing parameters for English and AllPay auctions.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AscendingSchedule {
    pub starting_bid: u128,
    pub min_bid_delta: u128,
    pub deadline: u64,
    /// Soft close: every accepted bid pushes the deadline out by this much.
    pub deadline_extension: u64,
    pub highest_bid: u128,
}

/// Timing and pricing parameters for sealed-bid (Vickrey) auctions.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SealedSchedule {
    pub min_bid: u128,
    pub commit_end: u64,
    pub reveal_end: u64,
    pub commit_fee: u128,
    /// Current second-highest revealed bid; starts at `min_bid` so a sole
    /// revealer pays the reserve.
    pub winning_bid: u128,
    /// Commit fees still held in escrow; drained to the auctioneer on
    /// withdraw for bidders who never revealed.
    pub accumulated_commit_fee: u128,
}

/// Timing and pricing parameters for reverse-Dutch auctions.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct DescendingSchedule {
    pub start_price: u128,
    pub min_price: u128,
    pub start_ts: u64,
    pub deadline: u64,
    pub duration: u64,
    /// `None` selects the linear curve; `Some(f)` the exponential curve with
    /// decay factor `f` in `DECAY_SCALE` units.
    pub decay_factor: Option<u64>,
    /// Price at which the item sold; equals `min_price` until a buyer arrives.
    pub settle_price: u128,
}

/// Per-kind schedule, tagged by protocol family.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Schedule {
    Ascending(AscendingSchedule),
    Sealed(SealedSchedule),
    Descending(DescendingSchedule),
}

impl Schedule {
    pub fn ascending(&self) -> Option<&AscendingSchedule> {
        match self {
            Schedule::Ascending(s) => Some(s),
            _ => None,
        }
    }

    pub fn ascending_mut(&mut self) -> Option<&mut AscendingSchedule> {
        match self {
            Schedule::Ascending(s) => Some(s),
            _ => None,
        }
    }

    pub fn sealed(&self) -> Option<&SealedSchedule> {
        match self {
            Schedule::Sealed(s) => Some(s),
            _ => None,
        }
    }

    pub fn sealed_mut(&mut self) -> Option<&mut SealedSchedule> {
        match self {
            Schedule::Sealed(s) => Some(s),
            _ => None,
        }
    }

    pub fn descending(&self) -> Option<&DescendingSchedule> {
        match self {
            Schedule::Descending(s) => Some(s),
            _ => None,
        }
    }

    pub fn descending_mut(&mut self) -> Option<&mut DescendingSchedule> {
        match self {
            Schedule::Descending(s) => Some(s),
            _ => None,
        }
    }
}

// =========================
// AUCTION RECORD
// =========================

/// One auction session, keyed by a monotonically assigned 64-bit id.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub id: u64,
    pub kind: AuctionKind,
    pub name: String,
    pub asset_kind: AssetKind,
    pub auctioneer: Principal,
    /// The escrowed lot: asset id plus token id (Unique) or amount (Fungible).
    pub item_asset: AssetId,
    pub item_value: u128,
    /// Fungible asset accepted for bids.
    pub pay_asset: AssetId,
    pub schedule: Schedule,
    pub status: AuctionStatus,
    /// Initialized to `auctioneer` until a bid takes the lead.
    pub winner: Principal,
    /// Fungible units owed to the auctioneer on withdraw. Zeroed strictly
    /// before any outbound transfer.
    pub available_funds: u128,
    /// The item has been released exactly once (settlement or cancel).
    pub is_claimed: bool,
    /// Fee recorded at creation; later parameter changes do not rewrite
    /// history.
    pub fee_bps_snapshot: u16,
    pub created_at: u64,
}

// =========================
// COMMIT-REVEAL ENCODING
// =========================

/// Digest used for sealed-bid commitments. The choice is part of the
/// on-the-wire contract; a deployment accepts exactly one scheme.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum CommitmentScheme {
    /// Keccak-256, for legacy compatibility. Default.
    Keccak256,
    Sha256,
}

/// Unsigned big-endian 32-byte encoding of a bid amount.
pub fn amount_be_bytes(amount: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&amount.to_be_bytes());
    out
}

/// Compute a sealed-bid commitment: `H(BE(amount, 32) || salt_32)`.
pub fn commitment_digest(scheme: CommitmentScheme, amount: u128, salt: &[u8; 32]) -> [u8; 32] {
    let encoded = amount_be_bytes(amount);
    match scheme {
        CommitmentScheme::Keccak256 => {
            use sha3::{Digest, Keccak256};
            let mut hasher = Keccak256::new();
            hasher.update(encoded);
            hasher.update(salt);
            hasher.finalize().into()
        }
        CommitmentScheme::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(encoded);
            hasher.update(salt);
            hasher.finalize().into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_be_bytes_layout() {
        let encoded = amount_be_bytes(0x0102_0304);
        assert_eq!(&encoded[..28], &[0u8; 28]);
        assert_eq!(&encoded[28..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_commitment_binds_amount_and_salt() {
        let salt = [7u8; 32];
        let c = commitment_digest(CommitmentScheme::Keccak256, 1_000, &salt);

        assert_ne!(c, commitment_digest(CommitmentScheme::Keccak256, 1_001, &salt));
        assert_ne!(c, commitment_digest(CommitmentScheme::Keccak256, 1_000, &[8u8; 32]));
    }

    #[test]
    fn test_commitment_schemes_disagree() {
        let salt = [3u8; 32];
        assert_ne!(
            commitment_digest(CommitmentScheme::Keccak256, 42, &salt),
            commitment_digest(CommitmentScheme::Sha256, 42, &salt),
        );
    }

    #[test]
    fn test_null_asset() {
        assert!(is_null_asset(&[0u8; 32]));
        assert!(!is_null_asset(&[1u8; 32]));
    }

    #[test]
    fn test_record_borsh_roundtrip() {
        let record = AuctionRecord {
            id: 1,
            kind: AuctionKind::English,
            name: "lot #1".to_string(),
            asset_kind: AssetKind::Unique,
            auctioneer: [1u8; 32],
            item_asset: [2u8; 32],
            item_value: 7,
            pay_asset: [3u8; 32],
            schedule: Schedule::Ascending(AscendingSchedule {
                starting_bid: FIXED_ONE,
                min_bid_delta: FIXED_ONE / 10,
                deadline: 1_000,
                deadline_extension: 10,
                highest_bid: 0,
            }),
            status: AuctionStatus::Open,
            winner: [1u8; 32],
            available_funds: 0,
            is_claimed: false,
            fee_bps_snapshot: 100,
            created_at: 995,
        };

        let encoded = borsh::to_vec(&record).unwrap();
        let decoded: AuctionRecord = borsh::from_slice(&encoded).unwrap();
        assert_eq!(record, decoded);
    }
}
