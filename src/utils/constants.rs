//! Ledger constants and default parameters.
//!
//! All ledger-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of every amount and rate handled by the ledger
pub const DECIMALS: u32 = 18;

/// Base unit: 1.0 expressed with 18 decimals
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULT PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default collateral cap - 5000 units
pub const DEFAULT_MAX_COLLATERAL: u128 = 5_000 * UNIT;

/// Default mint fee - 0.5% (50 basis points)
pub const DEFAULT_MINT_FEE_BPS: u64 = 50;

/// Default burn fee - 0%
pub const DEFAULT_BURN_FEE_BPS: u64 = 0;

/// Default oracle staleness window - 25 hours
pub const DEFAULT_RATE_STALE_AFTER_SECS: i64 = 25 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// CURRENCY KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral asset key
pub const COLLATERAL_KEY: &str = "ETH";

/// Synthetic collateral asset key
pub const COLLATERAL_SYNTH_KEY: &str = "sETH";

/// Synthetic stable asset key
pub const STABLE_SYNTH_KEY: &str = "sUSD";

// ═══════════════════════════════════════════════════════════════════════════════
// MISC
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

/// Maximum events kept in memory by logs
pub const MAX_EVENTS: usize = 1000;
