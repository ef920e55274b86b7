//! Fee distribution and rewards collaborators.
//!
//! Claimed fees are issued to the fee pool's address and then reported to
//! the pool; minting optionally enrols the beneficiary with a rewards
//! registry. Both are consumed through traits so the engine never depends on
//! a concrete distribution scheme.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::safe_add;

// ═══════════════════════════════════════════════════════════════════════════════
// INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Receives claimed fees in the stable synth
pub trait FeePool: Send + Sync {
    /// Account that claimed stable synth is issued to
    fn fee_address(&self) -> Address;

    /// Notify the pool that `amount` of stable synth was paid to it
    fn record_fee_paid(&self, amount: u128) -> Result<()>;
}

/// Registers minters for rewards
pub trait RewardsEnroller: Send + Sync {
    /// Credit `account` with `amount` of minted collateral
    fn enrol(&self, account: &Address, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE POOL LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct FeePoolState {
    total_recorded: u128,
    payments: u64,
}

/// In-process fee pool that tallies recorded payments
#[derive(Debug)]
pub struct FeePoolLedger {
    address: Address,
    state: RwLock<FeePoolState>,
}

impl FeePoolLedger {
    /// Create a pool receiving at `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: RwLock::new(FeePoolState::default()),
        }
    }

    /// Sum of all recorded payments
    pub fn total_recorded(&self) -> u128 {
        self.state.read().map(|s| s.total_recorded).unwrap_or(0)
    }

    /// Number of recorded payments
    pub fn payment_count(&self) -> u64 {
        self.state.read().map(|s| s.payments).unwrap_or(0)
    }
}

impl FeePool for FeePoolLedger {
    fn fee_address(&self) -> Address {
        self.address
    }

    fn record_fee_paid(&self, amount: u128) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.total_recorded = safe_add(state.total_recorded, amount)?;
        state.payments += 1;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWARDS REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process rewards registry keyed by account
#[derive(Debug, Default)]
pub struct RewardsRegistry {
    entries: RwLock<HashMap<Address, u128>>,
}

impl RewardsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Total enrolled for `account`
    pub fn enrolled(&self, account: &Address) -> u128 {
        self.entries
            .read()
            .map(|e| e.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of enrolled accounts
    pub fn participants(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl RewardsEnroller for RewardsRegistry {
    fn enrol(&self, account: &Address, amount: u128) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Lock)?;
        let current = entries.get(account).copied().unwrap_or(0);
        entries.insert(*account, safe_add(current, amount)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_pool_records() {
        let pool = FeePoolLedger::new(Address::from_label("fee-pool"));
        pool.record_fee_paid(100).unwrap();
        pool.record_fee_paid(50).unwrap();

        assert_eq!(pool.total_recorded(), 150);
        assert_eq!(pool.payment_count(), 2);
        assert_eq!(pool.fee_address(), Address::from_label("fee-pool"));
    }

    #[test]
    fn test_rewards_accumulate_per_account() {
        let rewards = RewardsRegistry::new();
        let alice = Address::from_label("alice");
        rewards.enrol(&alice, 10).unwrap();
        rewards.enrol(&alice, 5).unwrap();
        rewards.enrol(&Address::from_label("bob"), 1).unwrap();

        assert_eq!(rewards.enrolled(&alice), 15);
        assert_eq!(rewards.participants(), 2);
    }

    #[test]
    fn test_rewards_overflow() {
        let rewards = RewardsRegistry::new();
        let alice = Address::from_label("alice");
        rewards.enrol(&alice, u128::MAX).unwrap();
        assert!(rewards.enrol(&alice, 1).is_err());
    }
}
