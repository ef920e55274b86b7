//! Oracle module for exchange rates.
//!
//! - Currency keys
//! - The [`ExchangeRates`] collaborator interface consumed by fee claims
//! - An in-process implementation with staleness checks

pub mod rates;

pub use rates::*;
