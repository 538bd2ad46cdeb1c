//! In-memory asset custody for the dev harness.
//!
//! Tracks fungible balances per `(asset, principal)` and unique-token
//! ownership per `(asset, token_id)`. Escrowed value is held by the vault
//! itself, pooled per asset, which is all the engine's accounting needs.

use std::collections::HashMap;

use gavel_engine::{AssetGateway, GatewayError};
use gavel_types::{AssetId, AssetKind, Principal};

/// Who currently holds a unique token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    Principal(Principal),
    Escrow,
}

/// In-memory vault implementing the engine's custody capability.
#[derive(Debug, Default)]
pub struct Vault {
    fungible: HashMap<(AssetId, Principal), u128>,
    escrow_pool: HashMap<AssetId, u128>,
    unique: HashMap<(AssetId, u128), Holder>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint fungible units into a principal's balance.
    pub fn mint_fungible(&mut self, asset: AssetId, to: Principal, amount: u128) {
        *self.fungible.entry((asset, to)).or_insert(0) += amount;
    }

    /// Mint a unique token owned by a principal.
    pub fn mint_unique(&mut self, asset: AssetId, token_id: u128, owner: Principal) {
        self.unique.insert((asset, token_id), Holder::Principal(owner));
    }

    pub fn balance(&self, asset: &AssetId, principal: &Principal) -> u128 {
        self.fungible
            .get(&(*asset, *principal))
            .copied()
            .unwrap_or(0)
    }

    pub fn escrowed(&self, asset: &AssetId) -> u128 {
        self.escrow_pool.get(asset).copied().unwrap_or(0)
    }

    /// Current owner of a unique token, if minted and not escrowed.
    pub fn owner_of(&self, asset: &AssetId, token_id: u128) -> Option<Principal> {
        match self.unique.get(&(*asset, token_id)) {
            Some(Holder::Principal(p)) => Some(*p),
            _ => None,
        }
    }
}

impl AssetGateway for Vault {
    fn escrow_take(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        from: Principal,
        value: u128,
    ) -> Result<(), GatewayError> {
        match kind {
            AssetKind::Fungible => {
                let balance = self.fungible.entry((asset, from)).or_insert(0);
                if *balance < value {
                    return Err(GatewayError::InsufficientBalance);
                }
                *balance -= value;
                *self.escrow_pool.entry(asset).or_insert(0) += value;
                Ok(())
            }
            AssetKind::Unique => {
                let holder = self
                    .unique
                    .get_mut(&(asset, value))
                    .ok_or(GatewayError::UnknownAsset)?;
                if *holder != Holder::Principal(from) {
                    return Err(GatewayError::NotOwner);
                }
                *holder = Holder::Escrow;
                Ok(())
            }
        }
    }

    fn escrow_release(
        &mut self,
        kind: AssetKind,
        asset: AssetId,
        to: Principal,
        value: u128,
    ) -> Result<(), GatewayError> {
        match kind {
            AssetKind::Fungible => {
                let pool = self.escrow_pool.entry(asset).or_insert(0);
                if *pool < value {
                    return Err(GatewayError::InsufficientBalance);
                }
                *pool -= value;
                *self.fungible.entry((asset, to)).or_insert(0) += value;
                Ok(())
            }
            AssetKind::Unique => {
                let holder = self
                    .unique
                    .get_mut(&(asset, value))
                    .ok_or(GatewayError::UnknownAsset)?;
                if *holder != Holder::Escrow {
                    return Err(GatewayError::NotOwner);
                }
                *holder = Holder::Principal(to);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET: AssetId = [1u8; 32];
    const ALICE: Principal = [0xaa; 32];
    const BOB: Principal = [0xbb; 32];

    #[test]
    fn test_fungible_take_and_release() {
        let mut vault = Vault::new();
        vault.mint_fungible(ASSET, ALICE, 100);

        vault
            .escrow_take(AssetKind::Fungible, ASSET, ALICE, 60)
            .unwrap();
        assert_eq!(vault.balance(&ASSET, &ALICE), 40);
        assert_eq!(vault.escrowed(&ASSET), 60);

        vault
            .escrow_release(AssetKind::Fungible, ASSET, BOB, 60)
            .unwrap();
        assert_eq!(vault.balance(&ASSET, &BOB), 60);
        assert_eq!(vault.escrowed(&ASSET), 0);
    }

    #[test]
    fn test_fungible_overdraft_refused() {
        let mut vault = Vault::new();
        vault.mint_fungible(ASSET, ALICE, 10);
        let err = vault
            .escrow_take(AssetKind::Fungible, ASSET, ALICE, 11)
            .unwrap_err();
        assert_eq!(err, GatewayError::InsufficientBalance);
    }

    #[test]
    fn test_unique_ownership_transfers() {
        let mut vault = Vault::new();
        vault.mint_unique(ASSET, 7, ALICE);

        // Only the owner can escrow the token.
        let err = vault
            .escrow_take(AssetKind::Unique, ASSET, BOB, 7)
            .unwrap_err();
        assert_eq!(err, GatewayError::NotOwner);

        vault.escrow_take(AssetKind::Unique, ASSET, ALICE, 7).unwrap();
        assert_eq!(vault.owner_of(&ASSET, 7), None);

        vault
            .escrow_release(AssetKind::Unique, ASSET, BOB, 7)
            .unwrap();
        assert_eq!(vault.owner_of(&ASSET, 7), Some(BOB));
    }

    #[test]
    fn test_release_unescrowed_token_refused() {
        let mut vault = Vault::new();
        vault.mint_unique(ASSET, 7, ALICE);
        let err = vault
            .escrow_release(AssetKind::Unique, ASSET, BOB, 7)
            .unwrap_err();
        assert_eq!(err, GatewayError::NotOwner);
    }
}
