//! Collaborator registry.
//!
//! The engine talks to eight collaborators. They are injected as typed
//! trait objects through [`DependenciesBuilder`], which refuses to produce a
//! [`Dependencies`] set while any required collaborator is missing.

use std::fmt;
use std::sync::Arc;

use crate::core::config::WrapperSettings;
use crate::core::distribution::{FeePool, RewardsEnroller};
use crate::core::gate::PauseGate;
use crate::core::token::{SynthLedger, TokenLedger};
use crate::error::{Error, Result};
use crate::oracle::ExchangeRates;

// ═══════════════════════════════════════════════════════════════════════════════
// DEPENDENCY NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Logical name of each collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Custodied collateral token
    CollateralToken,
    /// Synthetic collateral ledger
    CollateralSynth,
    /// Synthetic stable ledger
    StableSynth,
    /// Exchange rate oracle
    ExchangeRates,
    /// Fee pool receiving claims
    FeePool,
    /// Cap and fee rate source
    Settings,
    /// Pause gate
    Gate,
    /// Rewards registry (optional)
    Rewards,
}

impl Dependency {
    /// Every collaborator
    pub const ALL: [Dependency; 8] = [
        Dependency::CollateralToken,
        Dependency::CollateralSynth,
        Dependency::StableSynth,
        Dependency::ExchangeRates,
        Dependency::FeePool,
        Dependency::Settings,
        Dependency::Gate,
        Dependency::Rewards,
    ];

    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            Dependency::CollateralToken => "collateral_token",
            Dependency::CollateralSynth => "collateral_synth",
            Dependency::StableSynth => "stable_synth",
            Dependency::ExchangeRates => "exchange_rates",
            Dependency::FeePool => "fee_pool",
            Dependency::Settings => "settings",
            Dependency::Gate => "gate",
            Dependency::Rewards => "rewards",
        }
    }

    /// Whether the engine cannot operate without it
    pub fn is_required(&self) -> bool {
        !matches!(self, Dependency::Rewards)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVED SET
// ═══════════════════════════════════════════════════════════════════════════════

/// A complete, resolved set of collaborators
#[derive(Clone)]
pub struct Dependencies {
    /// Custodied collateral token
    pub collateral: Arc<dyn TokenLedger>,
    /// Synthetic collateral ledger
    pub collateral_synth: Arc<dyn SynthLedger>,
    /// Synthetic stable ledger
    pub stable_synth: Arc<dyn SynthLedger>,
    /// Exchange rate oracle
    pub rates: Arc<dyn ExchangeRates>,
    /// Fee pool
    pub fee_pool: Arc<dyn FeePool>,
    /// Cap and fee rates
    pub settings: Arc<dyn WrapperSettings>,
    /// Pause gate
    pub gate: Arc<dyn PauseGate>,
    /// Rewards registry, when configured
    pub rewards: Option<Arc<dyn RewardsEnroller>>,
}

impl Dependencies {
    /// Start a builder
    pub fn builder() -> DependenciesBuilder {
        DependenciesBuilder::default()
    }

    /// Names the engine requires
    pub fn required() -> Vec<&'static str> {
        Dependency::ALL
            .iter()
            .filter(|d| d.is_required())
            .map(|d| d.name())
            .collect()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("collateral", &self.collateral.symbol())
            .field("collateral_synth", &self.collateral_synth.symbol())
            .field("stable_synth", &self.stable_synth.symbol())
            .field("fee_pool", &self.fee_pool.fee_address())
            .field("rewards", &self.rewards.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects collaborators and validates completeness
#[derive(Default)]
pub struct DependenciesBuilder {
    collateral: Option<Arc<dyn TokenLedger>>,
    collateral_synth: Option<Arc<dyn SynthLedger>>,
    stable_synth: Option<Arc<dyn SynthLedger>>,
    rates: Option<Arc<dyn ExchangeRates>>,
    fee_pool: Option<Arc<dyn FeePool>>,
    settings: Option<Arc<dyn WrapperSettings>>,
    gate: Option<Arc<dyn PauseGate>>,
    rewards: Option<Arc<dyn RewardsEnroller>>,
}

impl DependenciesBuilder {
    /// Set the collateral token
    pub fn collateral(mut self, token: Arc<dyn TokenLedger>) -> Self {
        self.collateral = Some(token);
        self
    }

    /// Set the synthetic collateral ledger
    pub fn collateral_synth(mut self, synth: Arc<dyn SynthLedger>) -> Self {
        self.collateral_synth = Some(synth);
        self
    }

    /// Set the synthetic stable ledger
    pub fn stable_synth(mut self, synth: Arc<dyn SynthLedger>) -> Self {
        self.stable_synth = Some(synth);
        self
    }

    /// Set the oracle
    pub fn rates(mut self, rates: Arc<dyn ExchangeRates>) -> Self {
        self.rates = Some(rates);
        self
    }

    /// Set the fee pool
    pub fn fee_pool(mut self, pool: Arc<dyn FeePool>) -> Self {
        self.fee_pool = Some(pool);
        self
    }

    /// Set the settings source
    pub fn settings(mut self, settings: Arc<dyn WrapperSettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the pause gate
    pub fn gate(mut self, gate: Arc<dyn PauseGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Set the rewards registry
    pub fn rewards(mut self, rewards: Arc<dyn RewardsEnroller>) -> Self {
        self.rewards = Some(rewards);
        self
    }

    /// Names of required collaborators not yet supplied
    pub fn missing(&self) -> Vec<Dependency> {
        let present = [
            (Dependency::CollateralToken, self.collateral.is_some()),
            (Dependency::CollateralSynth, self.collateral_synth.is_some()),
            (Dependency::StableSynth, self.stable_synth.is_some()),
            (Dependency::ExchangeRates, self.rates.is_some()),
            (Dependency::FeePool, self.fee_pool.is_some()),
            (Dependency::Settings, self.settings.is_some()),
            (Dependency::Gate, self.gate.is_some()),
        ];
        present
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(d, _)| d)
            .collect()
    }

    /// Resolve into a complete set
    pub fn build(self) -> Result<Dependencies> {
        fn require<T: ?Sized>(value: Option<Arc<T>>, dep: Dependency) -> Result<Arc<T>> {
            value.ok_or_else(|| Error::MissingDependency(dep.name().to_string()))
        }

        Ok(Dependencies {
            collateral: require(self.collateral, Dependency::CollateralToken)?,
            collateral_synth: require(self.collateral_synth, Dependency::CollateralSynth)?,
            stable_synth: require(self.stable_synth, Dependency::StableSynth)?,
            rates: require(self.rates, Dependency::ExchangeRates)?,
            fee_pool: require(self.fee_pool, Dependency::FeePool)?,
            settings: require(self.settings, Dependency::Settings)?,
            gate: require(self.gate, Dependency::Gate)?,
            rewards: self.rewards,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SharedSettings;
    use crate::core::distribution::FeePoolLedger;
    use crate::core::gate::PauseSwitch;
    use crate::core::token::InMemoryToken;
    use crate::oracle::StaticRates;
    use crate::utils::address::Address;

    fn full_builder() -> DependenciesBuilder {
        Dependencies::builder()
            .collateral(Arc::new(InMemoryToken::new("WETH")))
            .collateral_synth(Arc::new(InMemoryToken::new("sETH")))
            .stable_synth(Arc::new(InMemoryToken::new("sUSD")))
            .rates(Arc::new(StaticRates::default()))
            .fee_pool(Arc::new(FeePoolLedger::new(Address::from_label("pool"))))
            .settings(Arc::new(SharedSettings::default()))
            .gate(Arc::new(PauseSwitch::new()))
    }

    #[test]
    fn test_required_excludes_rewards() {
        let required = Dependencies::required();
        assert_eq!(required.len(), 7);
        assert!(!required.contains(&"rewards"));
    }

    #[test]
    fn test_build_without_rewards() {
        let deps = full_builder().build().unwrap();
        assert!(deps.rewards.is_none());
    }

    #[test]
    fn test_missing_dependency_named() {
        let builder = Dependencies::builder()
            .collateral(Arc::new(InMemoryToken::new("WETH")))
            .gate(Arc::new(PauseSwitch::new()));
        assert_eq!(builder.missing().len(), 5);

        let err = builder.build().unwrap_err();
        assert_eq!(err, Error::MissingDependency("collateral_synth".into()));
    }
}
