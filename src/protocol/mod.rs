//! Protocol module - events emitted by the wrapper.
//!
//! The event log is the externally observable trace of every mint, burn and
//! fee claim, in the order the engine serialized them.

pub mod events;

pub use events::*;
