//! Fixed-point arithmetic and mathematical utilities.
//!
//! Amounts and rates are `u128` integers scaled by [`UNIT`] (10^18).
//! Products are widened to 256 bits before scaling back down, so the only
//! overflow a caller can see is a result that does not fit `u128`.

use num_traits::ToPrimitive;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, DECIMALS, UNIT};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT RATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fraction with 18 decimal places precision (1.0 == `UNIT`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = UNIT;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from basis points (100 bps = 1%)
    pub fn from_bps(bps: u64) -> Self {
        Self((bps as u128) * Self::SCALE / (BPS_DIVISOR as u128))
    }

    /// Create from percentage (100 = 100%)
    pub fn from_percentage(pct: u64) -> Self {
        Self((pct as u128) * Self::SCALE / 100)
    }

    /// Create from a decimal fraction (`0.005` = 0.5%)
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        decimal_to_units(value, "rate").map(Self)
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Render as a percentage string, e.g. `0.5%`
    pub fn to_percentage_string(&self) -> String {
        match units_to_decimal(self.0) {
            Some(d) => format!("{}%", (d * Decimal::ONE_HUNDRED).normalize()),
            None => format!("{}e-18", self.0),
        }
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_units(self.0))
    }
}

impl From<FixedPoint> for u128 {
    fn from(value: FixedPoint) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL MULTIPLY / DIVIDE
// ═══════════════════════════════════════════════════════════════════════════════

fn narrow(value: U256, operation: &str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::ArithmeticOverflow {
            operation: operation.into(),
        });
    }
    Ok(value.low_u128())
}

/// `x * y / UNIT`, rounded to the nearest unit with ties going up
pub fn multiply_decimal_round(x: u128, y: u128) -> Result<u128> {
    let product = U256::from(x) * U256::from(y);
    let mut quotient_times_ten = product / U256::from(UNIT / 10);

    if quotient_times_ten % U256::from(10u8) >= U256::from(5u8) {
        quotient_times_ten += U256::from(10u8);
    }

    narrow(
        quotient_times_ten / U256::from(10u8),
        "multiply_decimal_round",
    )
}

/// `x * UNIT / y`, truncated toward zero
pub fn divide_decimal(x: u128, y: u128) -> Result<u128> {
    if y == 0 {
        return Err(Error::DivideByZero);
    }
    let scaled = U256::from(x) * U256::from(UNIT);
    narrow(scaled / U256::from(y), "divide_decimal")
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::ArithmeticOverflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::ArithmeticOverflow {
        operation: format!("{} - {}", a, b),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Whole units to base units (`3` -> `3 * 10^18`)
pub fn units(whole: u64) -> u128 {
    (whole as u128) * UNIT
}

fn decimal_to_units(value: Decimal, name: &str) -> Result<u128> {
    if value.is_sign_negative() {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "cannot be negative".into(),
        });
    }
    let scaled = value
        .checked_mul(Decimal::from(UNIT as u64))
        .ok_or(Error::ArithmeticOverflow {
            operation: format!("scale {}", name),
        })?;
    scaled.trunc().to_u128().ok_or(Error::ArithmeticOverflow {
        operation: format!("convert {}", name),
    })
}

fn units_to_decimal(amount: u128) -> Option<Decimal> {
    let mantissa = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, DECIMALS).ok()
}

/// Parse a decimal string (`"49.5"`) into base units
pub fn parse_units(s: &str) -> Result<u128> {
    let value = Decimal::from_str(s.trim()).map_err(|e| Error::InvalidParameter {
        name: "amount".into(),
        reason: e.to_string(),
    })?;
    decimal_to_units(value, "amount")
}

/// Render base units as a decimal string (`49500000000000000000` -> `"49.5"`)
pub fn format_units(amount: u128) -> String {
    match units_to_decimal(amount) {
        Some(d) => d.normalize().to_string(),
        None => {
            let fraction = format!("{:018}", amount % UNIT);
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{}", amount / UNIT)
            } else {
                format!("{}.{}", amount / UNIT, fraction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_decimal_round_half_up() {
        // 0.5 * 1e-18 = 0.5e-18 -> rounds up to 1e-18
        assert_eq!(multiply_decimal_round(1, UNIT / 2).unwrap(), 1);
        // 0.4e-18 -> rounds down to 0
        assert_eq!(multiply_decimal_round(1, UNIT * 4 / 10).unwrap(), 0);
        // 50 * 1% = 0.5
        assert_eq!(
            multiply_decimal_round(units(50), FixedPoint::from_percentage(1).raw()).unwrap(),
            UNIT / 2
        );
    }

    #[test]
    fn test_divide_decimal() {
        // 20.2 / 1.01 = 20
        let amount = parse_units("20.2").unwrap();
        let divisor = UNIT + FixedPoint::from_percentage(1).raw();
        assert_eq!(divide_decimal(amount, divisor).unwrap(), units(20));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(divide_decimal(units(1), 0), Err(Error::DivideByZero));
    }

    #[test]
    fn test_overflow_detected() {
        assert!(matches!(
            multiply_decimal_round(u128::MAX, u128::MAX),
            Err(Error::ArithmeticOverflow { .. })
        ));
        assert!(matches!(
            divide_decimal(u128::MAX, 1),
            Err(Error::ArithmeticOverflow { .. })
        ));
    }

    #[test]
    fn test_large_amount_does_not_overflow() {
        // a million units at a 1% fee needs more than 128 bits in the product
        let fee = multiply_decimal_round(units(1_000_000), FixedPoint::from_bps(100).raw()).unwrap();
        assert_eq!(fee, units(10_000));
    }

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());
        assert!(safe_sub(5, 3).is_ok());
        assert!(safe_sub(3, 5).is_err());
    }

    #[test]
    fn test_parse_and_format_units() {
        assert_eq!(parse_units("49.5").unwrap(), units(49) + UNIT / 2);
        assert_eq!(format_units(units(49) + UNIT / 2), "49.5");
        assert_eq!(format_units(0), "0");
        assert!(parse_units("-1").is_err());
        assert!(parse_units("abc").is_err());
    }

    #[test]
    fn test_fixed_point_constructors() {
        assert_eq!(FixedPoint::from_bps(50).raw(), UNIT / 200);
        assert_eq!(FixedPoint::from_percentage(100), FixedPoint::ONE);
        let rate = FixedPoint::from_decimal(Decimal::from_str("0.005").unwrap()).unwrap();
        assert_eq!(rate, FixedPoint::from_bps(50));
        assert_eq!(rate.to_percentage_string(), "0.5%");
    }
}
