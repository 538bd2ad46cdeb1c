//! Shared fixtures for engine unit tests.

use gavel_types::{AssetId, AssetKind, CommitmentScheme, Principal};

use crate::context::{CallContext, ProtocolParams};
use crate::gateway::{AssetGateway, EscrowOp, GatewayError};

pub const AUCTIONEER: Principal = [0xa1; 32];
pub const ALICE: Principal = [0xaa; 32];
pub const BOB: Principal = [0xbb; 32];
pub const CAROL: Principal = [0xcc; 32];
pub const TREASURY: Principal = [0x77; 32];

pub const ITEM_ASSET: AssetId = [0x01; 32];
pub const PAY_ASSET: AssetId = [0x02; 32];

pub fn ctx(sender: Principal, now: u64) -> CallContext {
    CallContext { sender, now }
}

pub fn params() -> ProtocolParams {
    ProtocolParams {
        fee_bps: 100,
        treasury: TREASURY,
        commitment_scheme: CommitmentScheme::Keccak256,
    }
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub op: EscrowOp,
    pub asset_kind: AssetKind,
    pub asset: AssetId,
    pub principal: Principal,
    pub value: u128,
}

/// Accept-everything gateway that records every call; can be armed to fail
/// at the nth call to exercise rollback.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub calls: Vec<GatewayCall>,
    pub fail_at: Option<usize>,
}

impl RecordingGateway {
    pub fn failing_at(n: usize) -> Self {
        Self {
            calls: Vec::new(),
            fail_at: Some(n),
        }
    }

    fn record(
        &mut self,
        op: EscrowOp,
        asset_kind: AssetKind,
        asset: AssetId,
        principal: Principal,
        value: u128,
    ) -> Result<(), GatewayError> {
        if self.fail_at == Some(self.calls.len()) {
            return Err(GatewayError::Other("injected failure".to_string()));
        }
        self.calls.push(GatewayCall {
            op,
            asset_kind,
            asset,
            principal,
            value,
        });
        Ok(())
    }

    /// Net fungible units moved to (positive) or from (negative) a principal.
    pub fn net_funds(&self, asset: &AssetId, principal: &Principal) -> i128 {
        self.calls
            .iter()
            .filter(|c| {
                c.asset_kind == AssetKind::Fungible && c.asset == *asset && c.principal == *principal
            })
            .map(|c| match c.op {
                EscrowOp::Take => -(c.value as i128),
                EscrowOp::Release => c.value as i128,
            })
            .sum()
    }

    /// Number of unique-item movements for an asset.
    pub fn item_transfers(&self, asset: &AssetId) -> usize {
        self.calls
            .iter()
            .filter(|c| c.asset_kind == AssetKind::Unique && c.asset == *asset)
            .count()
    }
}

impl AssetGateway for RecordingGateway {
    fn escrow_take(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        from: Principal,
        value: u128,
    ) -> Result<(), GatewayError> {
        self.record(EscrowOp::Take, kind, asset, from, value)
    }

    fn escrow_release(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        to: Principal,
        value: u128,
    ) -> Result<(), GatewayError> {
        self.record(EscrowOp::Release, kind, asset, to, value)
    }
}
