//! Debt ledger.
//!
//! Tracks how much synth the wrapper has issued and burnt, how much stable
//! synth it has issued through fee claims, and how much fee it holds in
//! escrow. These counters are the wrapper's only persistent state.

use serde::{Deserialize, Serialize};

use crate::core::config::EscrowPolicy;
use crate::error::{Error, Result};
use crate::utils::address::Hash;
use crate::utils::math::{safe_add, safe_sub};

/// Running counters of the wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebtLedger {
    /// Collateral synth ever issued (principal plus escrowed fee)
    pub issued_collateral_synth: u128,
    /// Collateral synth ever burnt (redemptions and claims)
    pub burnt_collateral_synth: u128,
    /// Stable synth ever issued to the fee pool
    pub issued_stable_synth: u128,
    /// Collateral synth fees held by the wrapper
    pub escrowed_fees: u128,
    /// Completed mutating operations, used to sequence events
    pub operations: u64,
}

impl DebtLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mint that issued `principal` to the caller and `fee` to escrow
    pub fn record_mint(&mut self, principal: u128, fee: u128) -> Result<()> {
        let issued = safe_add(principal, fee)?;
        let next_issued = safe_add(self.issued_collateral_synth, issued)?;
        let next_escrow = safe_add(self.escrowed_fees, fee)?;
        self.issued_collateral_synth = next_issued;
        self.escrowed_fees = next_escrow;
        Ok(())
    }

    /// Record `principal` burnt on redemption
    pub fn record_burn(&mut self, principal: u128) -> Result<()> {
        self.burnt_collateral_synth = safe_add(self.burnt_collateral_synth, principal)?;
        Ok(())
    }

    /// Record a burn fee moved into escrow
    pub fn record_burn_fee(&mut self, fee: u128) -> Result<()> {
        self.escrowed_fees = safe_add(self.escrowed_fees, fee)?;
        Ok(())
    }

    /// Check that `amount` may be claimed from escrow
    pub fn ensure_claimable(&self, amount: u128) -> Result<()> {
        if amount > self.escrowed_fees {
            return Err(Error::ClaimExceedsEscrow {
                requested: amount,
                escrowed: self.escrowed_fees,
            });
        }
        Ok(())
    }

    /// Record a claim of `amount` escrowed synth converted to `amount_stable`
    pub fn record_claim(
        &mut self,
        amount: u128,
        amount_stable: u128,
        policy: EscrowPolicy,
    ) -> Result<()> {
        self.ensure_claimable(amount)?;
        let burnt = safe_add(self.burnt_collateral_synth, amount)?;
        let stable = safe_add(self.issued_stable_synth, amount_stable)?;
        let escrow = match policy {
            EscrowPolicy::Retain => self.escrowed_fees,
            EscrowPolicy::Drain => safe_sub(self.escrowed_fees, amount)?,
        };
        self.burnt_collateral_synth = burnt;
        self.issued_stable_synth = stable;
        self.escrowed_fees = escrow;
        Ok(())
    }

    /// Advance the operation counter, returning the new sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.operations += 1;
        self.operations
    }

    /// Issued minus burnt, floored at zero
    pub fn net_issued_collateral_synth(&self) -> u128 {
        self.issued_collateral_synth
            .saturating_sub(self.burnt_collateral_synth)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Compute state hash
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::with_capacity(72);
        data.extend_from_slice(&self.issued_collateral_synth.to_be_bytes());
        data.extend_from_slice(&self.burnt_collateral_synth.to_be_bytes());
        data.extend_from_slice(&self.issued_stable_synth.to_be_bytes());
        data.extend_from_slice(&self.escrowed_fees.to_be_bytes());
        data.extend_from_slice(&self.operations.to_be_bytes());
        Hash::sha256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::units;

    #[test]
    fn test_record_mint() {
        let mut ledger = DebtLedger::new();
        ledger.record_mint(units(99), units(1)).unwrap();
        assert_eq!(ledger.issued_collateral_synth, units(100));
        assert_eq!(ledger.escrowed_fees, units(1));
        assert_eq!(ledger.net_issued_collateral_synth(), units(100));
    }

    #[test]
    fn test_record_burn() {
        let mut ledger = DebtLedger::new();
        ledger.record_mint(units(10), 0).unwrap();
        ledger.record_burn(units(4)).unwrap();
        ledger.record_burn_fee(units(1)).unwrap();
        assert_eq!(ledger.net_issued_collateral_synth(), units(6));
        assert_eq!(ledger.escrowed_fees, units(1));
    }

    #[test]
    fn test_net_issued_saturates() {
        let ledger = DebtLedger {
            issued_collateral_synth: 5,
            burnt_collateral_synth: 8,
            ..Default::default()
        };
        assert_eq!(ledger.net_issued_collateral_synth(), 0);
    }

    #[test]
    fn test_claim_retain_keeps_escrow() {
        let mut ledger = DebtLedger::new();
        ledger.record_mint(units(9), units(1)).unwrap();
        ledger
            .record_claim(units(1), units(2_000), EscrowPolicy::Retain)
            .unwrap();
        assert_eq!(ledger.escrowed_fees, units(1));
        assert_eq!(ledger.burnt_collateral_synth, units(1));
        assert_eq!(ledger.issued_stable_synth, units(2_000));
    }

    #[test]
    fn test_claim_drain_decrements_escrow() {
        let mut ledger = DebtLedger::new();
        ledger.record_mint(units(9), units(1)).unwrap();
        ledger
            .record_claim(units(1), units(2_000), EscrowPolicy::Drain)
            .unwrap();
        assert_eq!(ledger.escrowed_fees, 0);

        let err = ledger.record_claim(1, 1, EscrowPolicy::Drain).unwrap_err();
        assert_eq!(
            err,
            Error::ClaimExceedsEscrow {
                requested: 1,
                escrowed: 0
            }
        );
    }

    #[test]
    fn test_failed_mint_leaves_ledger_unchanged() {
        let mut ledger = DebtLedger {
            issued_collateral_synth: u128::MAX,
            ..Default::default()
        };
        let before = ledger;
        assert!(ledger.record_mint(1, 1).is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_serialization_and_hash() {
        let mut ledger = DebtLedger::new();
        ledger.record_mint(units(3), units(1)).unwrap();
        ledger.next_sequence();

        let restored = DebtLedger::from_bytes(&ledger.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, ledger);
        assert_eq!(restored.state_hash(), ledger.state_hash());
        assert_ne!(ledger.state_hash(), DebtLedger::new().state_hash());
    }
}
