//! Utility modules for the synthwrap ledger.
//!
//! - Addresses and hashes
//! - Fixed-point arithmetic
//! - Constants

pub mod address;
pub mod constants;
pub mod math;

pub use address::*;
pub use constants::*;
pub use math::*;
