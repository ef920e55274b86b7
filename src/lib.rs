//! # synthwrap
//!
//! A collateral-wrapping ledger. The engine custodies a wrapped native asset
//! and issues a 1:1 synthetic against it, minus a fee that is held in escrow.
//! Escrowed fees are converted into a stable synthetic at the oracle rate and
//! paid to a fee pool.
//!
//! ## Architecture
//!
//! - **Core**: fee model, reserve accounting, debt ledger and the engine
//! - **Oracle**: exchange rate interface and an in-process implementation
//! - **Protocol**: events emitted by the engine
//! - **CLI**: quotes and scenario simulation
//!
//! Every external party (tokens, oracle, fee pool, rewards, settings, pause
//! gate) is a trait injected through [`core::registry::Dependencies`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use synthwrap::prelude::*;
//!
//! let engine = WrapperEngine::new(address, deps);
//! let receipt = engine.mint(&alice, units(50))?;
//! assert_eq!(receipt.principal + receipt.fee, units(50));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{EscrowPolicy, SharedSettings, WrapperConfig, WrapperParams, WrapperSettings},
        debt::DebtLedger,
        distribution::{FeePool, FeePoolLedger, RewardsEnroller, RewardsRegistry},
        fees::FeeQuote,
        gate::{PauseGate, PauseSwitch},
        registry::{Dependencies, Dependency},
        token::{InMemoryToken, SynthLedger, TokenLedger},
        wrapper::{BurnReceipt, ClaimReceipt, CurrencyKeys, MintReceipt, WrapperEngine},
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{CurrencyKey, ExchangeRates, StaticRates};
    pub use crate::protocol::events::{EventLog, WrapperEvent};
    pub use crate::utils::{
        address::{Address, Hash},
        constants::UNIT,
        math::{divide_decimal, format_units, multiply_decimal_round, parse_units, units, FixedPoint},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
