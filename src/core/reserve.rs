//! Reserve accounting.
//!
//! Reserves are whatever the collateral token reports for the engine's own
//! address, read live on each call. Capacity is the headroom under the cap.

use serde::{Deserialize, Serialize};

use crate::core::token::TokenLedger;
use crate::utils::address::Address;

/// Collateral held by `holder` right now
pub fn reserve_balance(collateral: &dyn TokenLedger, holder: &Address) -> u128 {
    collateral.balance_of(holder)
}

/// Headroom under `max_collateral`, zero when reserves meet or exceed it
pub fn capacity(max_collateral: u128, reserves: u128) -> u128 {
    max_collateral.saturating_sub(reserves)
}

/// Reserves and cap observed together at one point of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    /// Collateral held
    pub reserves: u128,
    /// Collateral cap
    pub max_collateral: u128,
}

impl ReserveSnapshot {
    /// Read reserves live and pair them with `max_collateral`
    pub fn observe(collateral: &dyn TokenLedger, holder: &Address, max_collateral: u128) -> Self {
        Self {
            reserves: reserve_balance(collateral, holder),
            max_collateral,
        }
    }

    /// Remaining headroom
    pub fn capacity(&self) -> u128 {
        capacity(self.max_collateral, self.reserves)
    }

    /// True when nothing is held
    pub fn is_empty(&self) -> bool {
        self.reserves == 0
    }

    /// `amount` reduced to the remaining headroom
    pub fn clip(&self, amount: u128) -> u128 {
        amount.min(self.capacity())
    }

    /// Fraction of the cap in use, in basis points (saturates at 10000)
    pub fn utilization_bps(&self) -> u64 {
        if self.max_collateral == 0 {
            return 10_000;
        }
        let used = self.reserves.min(self.max_collateral);
        // used <= max, so the quotient is at most 10000
        ((used.saturating_mul(10_000)) / self.max_collateral) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::{InMemoryToken, SynthLedger};
    use crate::utils::math::units;

    #[test]
    fn test_capacity_never_negative() {
        assert_eq!(capacity(units(100), units(40)), units(60));
        assert_eq!(capacity(units(100), units(100)), 0);
        assert_eq!(capacity(units(100), units(150)), 0);
    }

    #[test]
    fn test_reserve_read_live() {
        let token = InMemoryToken::new("WETH");
        let engine = Address::from_label("engine");
        assert_eq!(reserve_balance(&token, &engine), 0);

        token.issue(&engine, units(7)).unwrap();
        assert_eq!(reserve_balance(&token, &engine), units(7));
    }

    #[test]
    fn test_snapshot_clip() {
        let snap = ReserveSnapshot {
            reserves: units(90),
            max_collateral: units(100),
        };
        assert_eq!(snap.capacity(), units(10));
        assert_eq!(snap.clip(units(50)), units(10));
        assert_eq!(snap.clip(units(3)), units(3));
        assert_eq!(snap.utilization_bps(), 9_000);
        assert!(!snap.is_empty());
    }

    #[test]
    fn test_lowered_cap_reports_zero() {
        let snap = ReserveSnapshot {
            reserves: units(90),
            max_collateral: units(50),
        };
        assert_eq!(snap.capacity(), 0);
        assert_eq!(snap.clip(units(1)), 0);
        assert_eq!(snap.utilization_bps(), 10_000);
    }
}
