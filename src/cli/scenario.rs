//! Scripted scenarios against an in-process deployment.
//!
//! A scenario is a JSON document listing steps (fund an account, mint, burn,
//! move the oracle, pause the gate, ...). [`Simulation`] wires a
//! [`WrapperEngine`] to in-memory collaborators and executes the steps in
//! order. A failing step is recorded and the run continues, so a scenario can
//! exercise rejection paths alongside successful ones.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::core::config::{SharedSettings, WrapperConfig};
use crate::core::debt::DebtLedger;
use crate::core::distribution::{FeePoolLedger, RewardsRegistry};
use crate::core::gate::PauseSwitch;
use crate::core::registry::Dependencies;
use crate::core::token::{InMemoryToken, SynthLedger, TokenEvent, TokenLedger};
use crate::core::wrapper::{CurrencyKeys, WrapperEngine};
use crate::error::{Error, Result};
use crate::oracle::{CurrencyKey, StaticRates};
use crate::protocol::events::WrapperEvent;
use crate::utils::address::Address;
use crate::utils::math::{format_units, parse_units, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Which token an approval applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    /// Custodied collateral
    Collateral,
    /// Synthetic collateral
    Synth,
}

/// One scripted action. Amounts and rates are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Credit an account with collateral
    Fund {
        /// Account label
        account: String,
        /// Collateral amount
        amount: String,
    },
    /// Authorize the engine to pull from an account
    Approve {
        /// Account label
        account: String,
        /// Token
        asset: Asset,
        /// Allowance
        amount: String,
    },
    /// Deposit collateral
    Mint {
        /// Payer label
        account: String,
        /// Collateral amount
        amount: String,
        /// Receiver of synth and rewards, defaults to the payer
        #[serde(default)]
        beneficiary: Option<String>,
    },
    /// Redeem synth (fee inclusive)
    Burn {
        /// Account label
        account: String,
        /// Synth amount
        amount: String,
    },
    /// Claim escrowed fees, everything claimable when `amount` is absent
    Claim {
        /// Synth amount
        #[serde(default)]
        amount: Option<String>,
    },
    /// Send collateral without minting
    Deposit {
        /// Sender label
        account: String,
        /// Amount
        amount: String,
    },
    /// Close the gate
    Pause,
    /// Open the gate
    Resume,
    /// Publish an oracle rate
    SetRate {
        /// Currency key
        key: String,
        /// Price in the unit of account
        rate: String,
    },
    /// Flag an oracle rate as invalid
    InvalidateRate {
        /// Currency key
        key: String,
    },
    /// Change the collateral cap
    SetCap {
        /// New cap
        amount: String,
    },
    /// Change the mint fee rate
    SetMintFee {
        /// Fraction, e.g. `0.01`
        rate: String,
    },
    /// Change the burn fee rate
    SetBurnFee {
        /// Fraction, e.g. `0.01`
        rate: String,
    },
}

impl Step {
    /// Action name as written in the scenario file
    pub fn action(&self) -> &'static str {
        match self {
            Step::Fund { .. } => "fund",
            Step::Approve { .. } => "approve",
            Step::Mint { .. } => "mint",
            Step::Burn { .. } => "burn",
            Step::Claim { .. } => "claim",
            Step::Deposit { .. } => "deposit",
            Step::Pause => "pause",
            Step::Resume => "resume",
            Step::SetRate { .. } => "set-rate",
            Step::InvalidateRate { .. } => "invalidate-rate",
            Step::SetCap { .. } => "set-cap",
            Step::SetMintFee { .. } => "set-mint-fee",
            Step::SetBurnFee { .. } => "set-burn-fee",
        }
    }
}

/// A scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Overrides the operator config when present
    #[serde(default)]
    pub config: Option<WrapperConfig>,
    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Position in the scenario (1-based)
    pub index: usize,
    /// Action name
    pub action: String,
    /// Whether the step succeeded
    pub ok: bool,
    /// Human readable summary or error message
    pub detail: String,
    /// Error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Per-step outcomes
    pub steps: Vec<StepOutcome>,
    /// Events emitted by the engine
    pub events: Vec<WrapperEvent>,
    /// Final ledger
    pub ledger: DebtLedger,
    /// Final reserves
    pub reserves: String,
    /// Final capacity
    pub capacity: String,
    /// Share of the cap in use, in basis points
    pub utilization_bps: u64,
    /// Hex digest of the event log
    pub event_digest: String,
    /// Final state of each token
    pub tokens: Vec<TokenSummary>,
}

/// Final state of one in-memory token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSummary {
    /// Token symbol
    pub symbol: String,
    /// Total supply, decimal
    pub total_supply: String,
    /// Accounts with a non-zero balance
    pub holders: usize,
    /// Hex digest over supply and balances
    pub state_hash: String,
    /// Operation log, oldest first
    pub operations: Vec<TokenEvent>,
}

impl TokenSummary {
    /// Capture the current state of `token`
    pub fn of(token: &InMemoryToken) -> Result<Self> {
        Ok(Self {
            symbol: token.symbol().to_string(),
            total_supply: format_units(token.total_supply()),
            holders: token.holder_count(),
            state_hash: token.state_hash()?.to_hex(),
            operations: token.recent_events(),
        })
    }
}

impl SimulationReport {
    /// Number of failed steps
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

/// An engine wired to in-memory collaborators
#[derive(Debug)]
pub struct Simulation {
    engine: WrapperEngine,
    collateral: Arc<InMemoryToken>,
    synth: Arc<InMemoryToken>,
    stable: Arc<InMemoryToken>,
    rates: Arc<StaticRates>,
    settings: Arc<SharedSettings>,
    gate: Arc<PauseSwitch>,
}

impl Simulation {
    /// Build a deployment from `config`
    pub fn new(config: &WrapperConfig) -> Result<Self> {
        config.validate()?;

        let collateral = Arc::new(InMemoryToken::new(config.collateral_key.as_str()));
        let synth = Arc::new(InMemoryToken::new(config.collateral_synth_key.as_str()));
        let stable = Arc::new(InMemoryToken::new(config.stable_key.as_str()));
        let rates = Arc::new(
            StaticRates::new(config.rate_stale_after_secs).with_pegged(config.stable_key.clone()),
        );
        let settings = Arc::new(SharedSettings::new(config.to_params()?)?);
        let gate = Arc::new(PauseSwitch::new());

        let deps = Dependencies::builder()
            .collateral(collateral.clone())
            .collateral_synth(synth.clone())
            .stable_synth(stable.clone())
            .rates(rates.clone())
            .fee_pool(Arc::new(FeePoolLedger::new(Address::from_label("fee-pool"))))
            .settings(settings.clone())
            .gate(gate.clone())
            .rewards(Arc::new(RewardsRegistry::new()))
            .build()?;

        let engine = WrapperEngine::new(Address::from_label("wrapper"), deps)
            .with_keys(CurrencyKeys::from(config));

        Ok(Self {
            engine,
            collateral,
            synth,
            stable,
            rates,
            settings,
            gate,
        })
    }

    /// The engine under simulation
    pub fn engine(&self) -> &WrapperEngine {
        &self.engine
    }

    /// Collateral balance of a labelled account
    pub fn collateral_balance(&self, account: &str) -> u128 {
        self.collateral.balance_of(&Address::from_label(account))
    }

    /// Synth balance of a labelled account
    pub fn synth_balance(&self, account: &str) -> u128 {
        self.synth.balance_of(&Address::from_label(account))
    }

    /// Execute one step
    pub fn apply(&self, step: &Step) -> Result<String> {
        let engine = &self.engine;
        match step {
            Step::Fund { account, amount } => {
                let amount = parse_units(amount)?;
                self.collateral.issue(&Address::from_label(account), amount)?;
                Ok(format!("{} funded with {}", account, format_units(amount)))
            }
            Step::Approve {
                account,
                asset,
                amount,
            } => {
                let amount = parse_units(amount)?;
                let token = match asset {
                    Asset::Collateral => &self.collateral,
                    Asset::Synth => &self.synth,
                };
                token.approve(&Address::from_label(account), &engine.address(), amount)?;
                Ok(format!(
                    "{} approved {} {}",
                    account,
                    format_units(amount),
                    token.symbol()
                ))
            }
            Step::Mint {
                account,
                amount,
                beneficiary,
            } => {
                let payer = Address::from_label(account);
                let receiver = beneficiary
                    .as_deref()
                    .map(Address::from_label)
                    .unwrap_or(payer);
                let r = engine.mint_with_tracking(&payer, parse_units(amount)?, &receiver)?;
                let mut detail = format!(
                    "deposited {} | principal {} | fee {}",
                    format_units(r.amount_in),
                    format_units(r.principal),
                    format_units(r.fee)
                );
                if r.was_clipped() {
                    detail.push_str(&format!(" | clipped from {}", format_units(r.requested)));
                }
                Ok(detail)
            }
            Step::Burn { account, amount } => {
                let r = engine.burn(&Address::from_label(account), parse_units(amount)?)?;
                let mut detail = format!(
                    "redeemed {} | principal {} | fee {}",
                    format_units(r.amount_in),
                    format_units(r.principal),
                    format_units(r.fee)
                );
                if r.clipped {
                    detail.push_str(" | clipped to reserves");
                }
                Ok(detail)
            }
            Step::Claim { amount } => {
                let receipt = match amount {
                    Some(amount) => Some(engine.claim_fees(parse_units(amount)?)?),
                    None => engine.claim_all_fees()?,
                };
                Ok(match receipt {
                    Some(r) => format!(
                        "claimed {} as {} stable",
                        format_units(r.amount),
                        format_units(r.amount_stable)
                    ),
                    None => "nothing to claim".to_string(),
                })
            }
            Step::Deposit { account, amount } => {
                engine.receive(&Address::from_label(account), parse_units(amount)?)?;
                Ok("accepted".to_string())
            }
            Step::Pause => {
                self.gate.pause();
                Ok("paused".to_string())
            }
            Step::Resume => {
                self.gate.resume();
                Ok("resumed".to_string())
            }
            Step::SetRate { key, rate } => {
                self.rates
                    .set_rate(CurrencyKey::new(key.as_str()), parse_units(rate)?)?;
                Ok(format!("{} = {}", key, rate))
            }
            Step::InvalidateRate { key } => {
                self.rates.invalidate(&CurrencyKey::new(key.as_str()))?;
                Ok(format!("{} invalidated", key))
            }
            Step::SetCap { amount } => {
                self.settings.set_max_collateral(parse_units(amount)?)?;
                Ok(format!("cap = {}", amount))
            }
            Step::SetMintFee { rate } => {
                self.settings
                    .set_mint_fee_rate(FixedPoint::from_raw(parse_units(rate)?))?;
                Ok(format!("mint fee = {}", rate))
            }
            Step::SetBurnFee { rate } => {
                self.settings
                    .set_burn_fee_rate(FixedPoint::from_raw(parse_units(rate)?))?;
                Ok(format!("burn fee = {}", rate))
            }
        }
    }

    /// Execute every step and collect the final state
    pub fn run(&self, scenario: &Scenario) -> Result<SimulationReport> {
        let steps = scenario
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| match self.apply(step) {
                Ok(detail) => StepOutcome {
                    index: i + 1,
                    action: step.action().to_string(),
                    ok: true,
                    detail,
                    error_code: None,
                },
                Err(e) => StepOutcome {
                    index: i + 1,
                    action: step.action().to_string(),
                    ok: false,
                    detail: e.to_string(),
                    error_code: Some(e.code()),
                },
            })
            .collect();

        Ok(SimulationReport {
            steps,
            events: self.engine.events()?,
            ledger: self.engine.ledger()?,
            reserves: format_units(self.engine.reserve_balance()?),
            capacity: format_units(self.engine.capacity()?),
            utilization_bps: self.engine.utilization_bps()?,
            event_digest: self.engine.event_digest()?.to_hex(),
            tokens: vec![
                TokenSummary::of(&self.collateral)?,
                TokenSummary::of(&self.synth)?,
                TokenSummary::of(&self.stable)?,
            ],
        })
    }
}
