//! Fee model.
//!
//! # Fee Types
//!
//! - **Mint fee**: charged on the collateral deposited, taken out of the
//!   synth issued to the minter
//! - **Burn fee**: charged on the principal burnt, paid on top of it
//!
//! Both are flat rates read from the settings snapshot pinned for the call.
//! Fees are rounded half up; the burn principal is truncated, so rounding
//! never favours the caller on redemption.

use serde::{Deserialize, Serialize};

use crate::core::config::WrapperParams;
use crate::error::Result;
use crate::utils::constants::UNIT;
use crate::utils::math::{divide_decimal, multiply_decimal_round, safe_add, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// FEE FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fee on a mint of `amount_in`
pub fn mint_fee(amount_in: u128, rate: FixedPoint) -> Result<u128> {
    multiply_decimal_round(amount_in, rate.raw())
}

/// Fee on a burn of `principal`
pub fn burn_fee(principal: u128, rate: FixedPoint) -> Result<u128> {
    multiply_decimal_round(principal, rate.raw())
}

/// Principal such that `principal * (1 + rate) <= amount_in`
pub fn burn_principal(amount_in: u128, rate: FixedPoint) -> Result<u128> {
    divide_decimal(amount_in, safe_add(UNIT, rate.raw())?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// Breakdown of an amount into principal and fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Amount entering the operation
    pub gross: u128,
    /// Part that is issued (mint) or burnt (burn)
    pub principal: u128,
    /// Part that is escrowed
    pub fee: u128,
}

impl FeeQuote {
    /// Split a mint deposit: `principal = gross - fee`
    pub fn for_mint(amount_in: u128, params: &WrapperParams) -> Result<Self> {
        let fee = mint_fee(amount_in, params.mint_fee_rate)?;
        Ok(Self {
            gross: amount_in,
            principal: amount_in.saturating_sub(fee),
            fee,
        })
    }

    /// Split a burn request: principal first, fee charged on the principal
    pub fn for_burn(amount_in: u128, params: &WrapperParams) -> Result<Self> {
        let principal = burn_principal(amount_in, params.burn_fee_rate)?;
        let fee = burn_fee(principal, params.burn_fee_rate)?;
        Ok(Self {
            gross: amount_in,
            principal,
            fee,
        })
    }

    /// Synth actually taken from the caller on a burn
    pub fn burn_outlay(&self) -> Result<u128> {
        safe_add(self.principal, self.fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::{parse_units, units};
    use proptest::prelude::*;

    fn params(mint_pct: u64, burn_pct: u64) -> WrapperParams {
        WrapperParams {
            mint_fee_rate: FixedPoint::from_percentage(mint_pct),
            burn_fee_rate: FixedPoint::from_percentage(burn_pct),
            ..Default::default()
        }
    }

    #[test]
    fn test_mint_quote() {
        let quote = FeeQuote::for_mint(units(50), &params(1, 0)).unwrap();
        assert_eq!(quote.fee, parse_units("0.5").unwrap());
        assert_eq!(quote.principal, parse_units("49.5").unwrap());
        assert_eq!(quote.gross, units(50));
    }

    #[test]
    fn test_burn_quote() {
        let amount = parse_units("20.2").unwrap();
        let quote = FeeQuote::for_burn(amount, &params(0, 1)).unwrap();
        assert_eq!(quote.principal, units(20));
        assert_eq!(quote.fee, parse_units("0.2").unwrap());
        assert_eq!(quote.burn_outlay().unwrap(), amount);
    }

    #[test]
    fn test_zero_burn_fee_principal_is_amount() {
        let quote = FeeQuote::for_burn(units(3), &params(0, 0)).unwrap();
        assert_eq!(quote.principal, units(3));
        assert_eq!(quote.fee, 0);
    }

    #[test]
    fn test_default_mint_fee() {
        let fee = mint_fee(units(100), WrapperParams::default().mint_fee_rate).unwrap();
        assert_eq!(fee, parse_units("0.5").unwrap());
    }

    proptest! {
        #[test]
        fn prop_mint_fee_within_amount(amount in 0u128..1_000_000 * UNIT, bps in 0u64..10_000) {
            let fee = mint_fee(amount, FixedPoint::from_bps(bps)).unwrap();
            prop_assert!(fee <= amount);
        }

        #[test]
        fn prop_burn_outlay_never_exceeds_request(amount in 0u128..1_000_000 * UNIT, bps in 0u64..5_000) {
            let p = WrapperParams {
                burn_fee_rate: FixedPoint::from_bps(bps),
                ..Default::default()
            };
            let quote = FeeQuote::for_burn(amount, &p).unwrap();
            // truncated principal plus a half-up fee can exceed the request by at most one unit
            prop_assert!(quote.burn_outlay().unwrap() <= amount + 1);
        }
    }
}
