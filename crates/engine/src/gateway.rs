//! Asset gateway capability and the effect list.
//!
//! The engine never moves value directly. Each transition records its
//! intended movements as an ordered list of [`Effect`]s while the ledger is
//! exclusively borrowed; the list is executed against the gateway only after
//! the borrow has been dropped. Takes are ordered before releases so that a
//! refused debit aborts the operation before anything has been paid out.

use gavel_types::{AssetId, AssetKind, Principal};
use thiserror::Error;

/// Errors surfaced by an asset gateway implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("caller does not hold the item")]
    NotOwner,

    #[error("unknown asset")]
    UnknownAsset,

    #[error("gateway error: {0}")]
    Other(String),
}

/// External custody capability.
///
/// `escrow_take` moves value from a principal into engine escrow;
/// `escrow_release` moves it back out. For `AssetKind::Unique` the value is a
/// token id, for `AssetKind::Fungible` an amount. Implementations must be
/// safe against concurrent calls from different auctions.
pub trait AssetGateway {
    fn escrow_take(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        from: Principal,
        value: u128,
    ) -> Result<(), GatewayError>;

    fn escrow_release(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        to: Principal,
        value: u128,
    ) -> Result<(), GatewayError>;
}

/// Direction of an escrow movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowOp {
    Take,
    Release,
}

/// One intended asset movement, recorded during a transition and executed
/// after the ledger borrow is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub op: EscrowOp,
    pub asset_kind: AssetKind,
    pub asset: AssetId,
    pub principal: Principal,
    pub value: u128,
}

impl Effect {
    pub fn take(asset_kind: AssetKind, asset: AssetId, from: Principal, value: u128) -> Self {
        Self {
            op: EscrowOp::Take,
            asset_kind,
            asset,
            principal: from,
            value,
        }
    }

    pub fn release(asset_kind: AssetKind, asset: AssetId, to: Principal, value: u128) -> Self {
        Self {
            op: EscrowOp::Release,
            asset_kind,
            asset,
            principal: to,
            value,
        }
    }

    /// Take fungible payment units from a bidder.
    pub fn take_funds(asset: AssetId, from: Principal, amount: u128) -> Self {
        Self::take(AssetKind::Fungible, asset, from, amount)
    }

    /// Release fungible payment units to a principal.
    pub fn release_funds(asset: AssetId, to: Principal, amount: u128) -> Self {
        Self::release(AssetKind::Fungible, asset, to, amount)
    }
}

/// Execute an effect list in order, stopping at the first failure.
///
/// Zero-value fungible movements are skipped; engines only emit them when a
/// split leg (fee, refund) happens to be empty.
pub fn run_effects(gateway: &mut dyn AssetGateway, effects: &[Effect]) -> Result<(), GatewayError> {
    for effect in effects {
        if effect.value == 0 && effect.asset_kind == AssetKind::Fungible {
            continue;
        }
        match effect.op {
            EscrowOp::Take => gateway.escrow_take(
                effect.asset_kind,
                effect.asset,
                effect.principal,
                effect.value,
            )?,
            EscrowOp::Release => gateway.escrow_release(
                effect.asset_kind,
                effect.asset,
                effect.principal,
                effect.value,
            )?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct CountingGateway {
        balances: HashMap<(AssetId, Principal), u128>,
        calls: usize,
    }

    impl AssetGateway for CountingGateway {
        fn escrow_take(
            &mut self,
            _kind: AssetKind,
            asset: AssetId,
            from: Principal,
            value: u128,
        ) -> Result<(), GatewayError> {
            self.calls += 1;
            let balance = self.balances.entry((asset, from)).or_insert(0);
            if *balance < value {
                return Err(GatewayError::InsufficientBalance);
            }
            *balance -= value;
            Ok(())
        }

        fn escrow_release(
            &mut self,
            _kind: AssetKind,
            asset: AssetId,
            to: Principal,
            value: u128,
        ) -> Result<(), GatewayError> {
            self.calls += 1;
            *self.balances.entry((asset, to)).or_insert(0) += value;
            Ok(())
        }
    }

    #[test]
    fn test_run_effects_in_order() {
        let asset = [1u8; 32];
        let alice = [0xaau8; 32];
        let bob = [0xbbu8; 32];

        let mut gateway = CountingGateway::default();
        gateway.balances.insert((asset, alice), 100);

        let effects = vec![
            Effect::take_funds(asset, alice, 60),
            Effect::release_funds(asset, bob, 60),
        ];
        run_effects(&mut gateway, &effects).unwrap();
        assert_eq!(gateway.balances[&(asset, alice)], 40);
        assert_eq!(gateway.balances[&(asset, bob)], 60);
    }

    #[test]
    fn test_run_effects_stops_on_failure() {
        let asset = [1u8; 32];
        let alice = [0xaau8; 32];
        let bob = [0xbbu8; 32];

        let mut gateway = CountingGateway::default();
        let effects = vec![
            Effect::take_funds(asset, alice, 60),
            Effect::release_funds(asset, bob, 60),
        ];
        let err = run_effects(&mut gateway, &effects).unwrap_err();
        assert_eq!(err, GatewayError::InsufficientBalance);
        assert_eq!(gateway.calls, 1);
        assert!(!gateway.balances.contains_key(&(asset, bob)));
    }

    #[test]
    fn test_run_effects_skips_zero_fungible() {
        let asset = [1u8; 32];
        let bob = [0xbbu8; 32];

        let mut gateway = CountingGateway::default();
        let effects = vec![Effect::release_funds(asset, bob, 0)];
        run_effects(&mut gateway, &effects).unwrap();
        assert_eq!(gateway.calls, 0);
    }
}
