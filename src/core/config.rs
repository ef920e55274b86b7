//! Wrapper configuration.
//!
//! Two layers live here:
//! - [`WrapperConfig`]: the operator-facing file format (JSON, decimal strings)
//! - [`WrapperSettings`]: the read-only collaborator the engine queries on
//!   every call, with [`SharedSettings`] as the in-process implementation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::oracle::CurrencyKey;
use crate::utils::constants::*;
use crate::utils::math::{format_units, parse_units, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// ESCROW POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// How a fee claim treats the escrow counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowPolicy {
    /// Claims leave `escrowed_fees` untouched; the counter is cumulative and
    /// overstates what is still claimable after the first claim.
    #[default]
    Retain,
    /// Claims decrement `escrowed_fees` by the claimed amount.
    Drain,
}

impl FromStr for EscrowPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "retain" => Ok(EscrowPolicy::Retain),
            "drain" => Ok(EscrowPolicy::Drain),
            other => Err(Error::Config(format!("unknown escrow policy: {}", other))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRAPPER PARAMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters the engine pins at the start of every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperParams {
    /// Collateral cap in base units
    pub max_collateral: u128,
    /// Mint fee rate
    pub mint_fee_rate: FixedPoint,
    /// Burn fee rate
    pub burn_fee_rate: FixedPoint,
    /// Escrow counter treatment on claim
    pub escrow_policy: EscrowPolicy,
}

impl Default for WrapperParams {
    fn default() -> Self {
        Self {
            max_collateral: DEFAULT_MAX_COLLATERAL,
            mint_fee_rate: FixedPoint::from_bps(DEFAULT_MINT_FEE_BPS),
            burn_fee_rate: FixedPoint::from_bps(DEFAULT_BURN_FEE_BPS),
            escrow_policy: EscrowPolicy::default(),
        }
    }
}

impl WrapperParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.mint_fee_rate >= FixedPoint::ONE {
            return Err(Error::InvalidParameter {
                name: "mint_fee_rate".into(),
                reason: "must be below 1".into(),
            });
        }
        if self.burn_fee_rate >= FixedPoint::ONE {
            return Err(Error::InvalidParameter {
                name: "burn_fee_rate".into(),
                reason: "must be below 1".into(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS COLLABORATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only source of the cap and fee rates
pub trait WrapperSettings: Send + Sync {
    /// Collateral cap
    fn max_collateral(&self) -> u128;

    /// Mint fee rate
    fn mint_fee_rate(&self) -> FixedPoint;

    /// Burn fee rate
    fn burn_fee_rate(&self) -> FixedPoint;

    /// Escrow counter treatment on claim
    fn escrow_policy(&self) -> EscrowPolicy {
        EscrowPolicy::Retain
    }

    /// All values read together
    fn snapshot(&self) -> WrapperParams {
        WrapperParams {
            max_collateral: self.max_collateral(),
            mint_fee_rate: self.mint_fee_rate(),
            burn_fee_rate: self.burn_fee_rate(),
            escrow_policy: self.escrow_policy(),
        }
    }
}

/// In-process settings that an operator can update between calls
#[derive(Debug, Default)]
pub struct SharedSettings {
    params: RwLock<WrapperParams>,
}

impl SharedSettings {
    /// Create from validated parameters
    pub fn new(params: WrapperParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params: RwLock::new(params),
        })
    }

    /// Replace all parameters
    pub fn update(&self, params: WrapperParams) -> Result<()> {
        params.validate()?;
        *self.params.write().map_err(|_| Error::Lock)? = params;
        Ok(())
    }

    /// Set the collateral cap
    pub fn set_max_collateral(&self, max_collateral: u128) -> Result<()> {
        self.params.write().map_err(|_| Error::Lock)?.max_collateral = max_collateral;
        Ok(())
    }

    /// Set the mint fee rate
    pub fn set_mint_fee_rate(&self, rate: FixedPoint) -> Result<()> {
        let mut next = self.current()?;
        next.mint_fee_rate = rate;
        self.update(next)
    }

    /// Set the burn fee rate
    pub fn set_burn_fee_rate(&self, rate: FixedPoint) -> Result<()> {
        let mut next = self.current()?;
        next.burn_fee_rate = rate;
        self.update(next)
    }

    fn current(&self) -> Result<WrapperParams> {
        self.params.read().map(|p| *p).map_err(|_| Error::Lock)
    }
}

impl WrapperSettings for SharedSettings {
    fn max_collateral(&self) -> u128 {
        self.snapshot().max_collateral
    }

    fn mint_fee_rate(&self) -> FixedPoint {
        self.snapshot().mint_fee_rate
    }

    fn burn_fee_rate(&self) -> FixedPoint {
        self.snapshot().burn_fee_rate
    }

    fn escrow_policy(&self) -> EscrowPolicy {
        self.snapshot().escrow_policy
    }

    fn snapshot(&self) -> WrapperParams {
        // A poisoned lock still holds the last written value.
        match self.params.read() {
            Ok(p) => *p,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapperConfig {
    /// Collateral cap, in whole units (decimal string)
    pub max_collateral: Decimal,
    /// Mint fee as a fraction (`0.005` = 0.5%)
    pub mint_fee_rate: Decimal,
    /// Burn fee as a fraction
    pub burn_fee_rate: Decimal,
    /// Escrow counter treatment on claim
    #[serde(default)]
    pub escrow_policy: EscrowPolicy,
    /// Collateral asset key
    pub collateral_key: CurrencyKey,
    /// Synthetic collateral asset key
    pub collateral_synth_key: CurrencyKey,
    /// Synthetic stable asset key
    pub stable_key: CurrencyKey,
    /// Oracle rates older than this are invalid
    pub rate_stale_after_secs: i64,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            max_collateral: Decimal::from((DEFAULT_MAX_COLLATERAL / UNIT) as u64),
            mint_fee_rate: Decimal::new(DEFAULT_MINT_FEE_BPS as i64, 4),
            burn_fee_rate: Decimal::new(DEFAULT_BURN_FEE_BPS as i64, 4),
            escrow_policy: EscrowPolicy::default(),
            collateral_key: CurrencyKey::new(COLLATERAL_KEY),
            collateral_synth_key: CurrencyKey::new(COLLATERAL_SYNTH_KEY),
            stable_key: CurrencyKey::new(STABLE_SYNTH_KEY),
            rate_stale_after_secs: DEFAULT_RATE_STALE_AFTER_SECS,
        }
    }
}

impl WrapperConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults overridden by `SYNTHWRAP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `SYNTHWRAP_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = std::env::var("SYNTHWRAP_MAX_COLLATERAL") {
            self.max_collateral = parse_decimal("SYNTHWRAP_MAX_COLLATERAL", &v)?;
        }
        if let Ok(v) = std::env::var("SYNTHWRAP_MINT_FEE_RATE") {
            self.mint_fee_rate = parse_decimal("SYNTHWRAP_MINT_FEE_RATE", &v)?;
        }
        if let Ok(v) = std::env::var("SYNTHWRAP_BURN_FEE_RATE") {
            self.burn_fee_rate = parse_decimal("SYNTHWRAP_BURN_FEE_RATE", &v)?;
        }
        if let Ok(v) = std::env::var("SYNTHWRAP_ESCROW_POLICY") {
            self.escrow_policy = v.parse()?;
        }
        if let Ok(v) = std::env::var("SYNTHWRAP_RATE_STALE_AFTER_SECS") {
            self.rate_stale_after_secs = v
                .parse()
                .map_err(|_| Error::Config(format!("SYNTHWRAP_RATE_STALE_AFTER_SECS: {}", v)))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_stale_after_secs <= 0 {
            return Err(Error::Config("rate_stale_after_secs must be positive".into()));
        }
        if self.collateral_synth_key == self.stable_key {
            return Err(Error::Config("synth keys must differ".into()));
        }
        self.to_params()?.validate()
    }

    /// Convert to engine parameters
    pub fn to_params(&self) -> Result<WrapperParams> {
        Ok(WrapperParams {
            max_collateral: parse_units(&self.max_collateral.to_string())?,
            mint_fee_rate: FixedPoint::from_decimal(self.mint_fee_rate)?,
            burn_fee_rate: FixedPoint::from_decimal(self.burn_fee_rate)?,
            escrow_policy: self.escrow_policy,
        })
    }

    /// Human readable summary
    pub fn describe(&self) -> Result<String> {
        let params = self.to_params()?;
        Ok(format!(
            "cap {} {} | mint fee {} | burn fee {} | escrow {:?}",
            format_units(params.max_collateral),
            self.collateral_key,
            params.mint_fee_rate.to_percentage_string(),
            params.burn_fee_rate.to_percentage_string(),
            params.escrow_policy,
        ))
    }
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).map_err(|e| Error::Config(format!("{}: {}", name, e)))
}
