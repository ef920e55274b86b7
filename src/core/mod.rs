//! Core modules for the wrapper.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and the settings collaborator
//! - Reserve accounting and the fee model
//! - The debt ledger
//! - Collaborator interfaces (tokens, fee pool, rewards, gate, registry)
//! - The wrapper engine itself

pub mod config;
pub mod debt;
pub mod distribution;
pub mod fees;
pub mod gate;
pub mod registry;
pub mod reserve;
pub mod token;
pub mod wrapper;

pub use config::*;
pub use debt::*;
pub use distribution::*;
pub use fees::*;
pub use gate::*;
pub use registry::*;
pub use reserve::*;
pub use token::*;
pub use wrapper::*;
