//! Exchange rate collaborator.
//!
//! The wrapper only needs two things from an oracle: whether a currency's
//! rate can currently be trusted, and the value of an amount of one currency
//! expressed in another. [`StaticRates`] is an in-process implementation with
//! staleness tracking.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::constants::{DEFAULT_RATE_STALE_AFTER_SECS, UNIT};
use crate::utils::math::{divide_decimal, multiply_decimal_round};

// ═══════════════════════════════════════════════════════════════════════════════
// CURRENCY KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Currency identifier (`"ETH"`, `"sETH"`, `"sUSD"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyKey(String);

impl CurrencyKey {
    /// Create a new key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXCHANGE RATES INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle consumed by fee claims
pub trait ExchangeRates: Send + Sync {
    /// True when the rate for `key` must not be used
    fn rate_is_invalid(&self, key: &CurrencyKey) -> bool;

    /// Value of `amount` of `from` denominated in `to`
    fn effective_value(&self, from: &CurrencyKey, amount: u128, to: &CurrencyKey) -> Result<u128>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single rate observation (18-decimal price in the unit of account)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateData {
    /// Rate with 18 decimals
    pub rate: u128,
    /// Unix timestamp of the observation
    pub updated_at: i64,
    /// Explicitly flagged as invalid (e.g. circuit breaker tripped)
    pub flagged: bool,
}

impl RateData {
    /// Check if rate is fresh
    pub fn is_fresh(&self, now: i64, max_age: i64) -> bool {
        now.saturating_sub(self.updated_at) <= max_age
    }

    /// Check whether the rate may be used at `now`
    pub fn is_usable(&self, now: i64, max_age: i64) -> bool {
        !self.flagged && self.rate > 0 && self.is_fresh(now, max_age)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC RATES
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process oracle with per-key rates, pegged keys and staleness
#[derive(Debug)]
pub struct StaticRates {
    rates: RwLock<HashMap<CurrencyKey, RateData>>,
    /// Keys fixed at 1.0 that never go stale (the unit of account)
    pegged: HashSet<CurrencyKey>,
    stale_after_secs: i64,
}

impl Default for StaticRates {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_STALE_AFTER_SECS)
    }
}

impl StaticRates {
    /// Create an empty oracle
    pub fn new(stale_after_secs: i64) -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
            pegged: HashSet::new(),
            stale_after_secs,
        }
    }

    /// Peg `key` at 1.0
    pub fn with_pegged(mut self, key: CurrencyKey) -> Self {
        self.pegged.insert(key);
        self
    }

    /// Record a rate observed now
    pub fn set_rate(&self, key: CurrencyKey, rate: u128) -> Result<()> {
        self.set_rate_at(key, rate, chrono::Utc::now().timestamp())
    }

    /// Record a rate observed at `timestamp`
    pub fn set_rate_at(&self, key: CurrencyKey, rate: u128, timestamp: i64) -> Result<()> {
        if rate == 0 {
            return Err(Error::InvalidParameter {
                name: "rate".into(),
                reason: "cannot be zero".into(),
            });
        }
        self.rates.write().map_err(|_| Error::Lock)?.insert(
            key,
            RateData {
                rate,
                updated_at: timestamp,
                flagged: false,
            },
        );
        Ok(())
    }

    /// Flag the current rate for `key` as invalid
    pub fn invalidate(&self, key: &CurrencyKey) -> Result<()> {
        if let Some(data) = self.rates.write().map_err(|_| Error::Lock)?.get_mut(key) {
            data.flagged = true;
        }
        Ok(())
    }

    /// Current observation for `key`
    pub fn rate_for(&self, key: &CurrencyKey) -> Option<RateData> {
        if self.pegged.contains(key) {
            return Some(RateData {
                rate: UNIT,
                updated_at: i64::MAX,
                flagged: false,
            });
        }
        self.rates.read().ok()?.get(key).copied()
    }

    fn usable_rate(&self, key: &CurrencyKey, now: i64) -> Result<u128> {
        match self.rate_for(key) {
            Some(data) if data.is_usable(now, self.stale_after_secs) => Ok(data.rate),
            _ => Err(Error::StaleRate(key.to_string())),
        }
    }
}

impl ExchangeRates for StaticRates {
    fn rate_is_invalid(&self, key: &CurrencyKey) -> bool {
        if self.pegged.contains(key) {
            return false;
        }
        let now = chrono::Utc::now().timestamp();
        self.usable_rate(key, now).is_err()
    }

    fn effective_value(&self, from: &CurrencyKey, amount: u128, to: &CurrencyKey) -> Result<u128> {
        if from == to {
            return Ok(amount);
        }
        let now = chrono::Utc::now().timestamp();
        let from_rate = self.usable_rate(from, now)?;
        let to_rate = self.usable_rate(to, now)?;
        divide_decimal(multiply_decimal_round(amount, from_rate)?, to_rate)
    }
}
