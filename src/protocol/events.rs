//! Wrapper events for state change notifications.
//!
//! Every successful mint, burn and fee claim emits one event. Parameter
//! changes observed between calls are reported as well, so a consumer of the
//! log can replay which rates applied to each operation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::utils::address::{Address, Hash};
use crate::utils::constants::MAX_EVENTS;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All wrapper event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapperEvent {
    /// Collateral deposited and synth issued
    Minted(MintedEvent),
    /// Synth burnt and collateral released
    Burned(BurnedEvent),
    /// Escrowed fees converted and paid to the fee pool
    FeesClaimed(FeesClaimedEvent),
    /// A settings value differs from the one seen by the previous call
    SettingsChanged(SettingsChangedEvent),
}

impl WrapperEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Minted(_) => "Minted",
            Self::Burned(_) => "Burned",
            Self::FeesClaimed(_) => "FeesClaimed",
            Self::SettingsChanged(_) => "SettingsChanged",
        }
    }

    /// Operation sequence number the event belongs to
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Minted(e) => e.sequence,
            Self::Burned(e) => e.sequence,
            Self::FeesClaimed(e) => e.sequence,
            Self::SettingsChanged(e) => e.sequence,
        }
    }

    /// Unix timestamp of the event
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Minted(e) => e.timestamp,
            Self::Burned(e) => e.timestamp,
            Self::FeesClaimed(e) => e.timestamp,
            Self::SettingsChanged(e) => e.timestamp,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted on mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedEvent {
    /// Beneficiary of the issued synth
    pub account: Address,
    /// Synth issued to the beneficiary
    pub principal: u128,
    /// Synth issued to escrow
    pub fee: u128,
    /// Collateral pulled (after clipping)
    pub amount_in: u128,
    /// Operation sequence
    pub sequence: u64,
    /// Timestamp
    pub timestamp: i64,
}

/// Event emitted on burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnedEvent {
    /// Caller
    pub account: Address,
    /// Synth burnt and collateral released
    pub principal: u128,
    /// Synth moved into escrow
    pub fee: u128,
    /// Amount requested, capped at reserves
    pub amount_in: u128,
    /// Operation sequence
    pub sequence: u64,
    /// Timestamp
    pub timestamp: i64,
}

/// Event emitted on fee claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeesClaimedEvent {
    /// Collateral synth burnt from escrow
    pub amount: u128,
    /// Stable synth issued to the pool
    pub amount_stable: u128,
    /// Pool address
    pub fee_pool: Address,
    /// Operation sequence
    pub sequence: u64,
    /// Timestamp
    pub timestamp: i64,
}

/// Event emitted when a call observes a changed setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsChangedEvent {
    /// Parameter that changed
    pub parameter: String,
    /// Old value (as string for flexibility)
    pub old_value: String,
    /// New value
    pub new_value: String,
    /// Sequence of the call that observed it
    pub sequence: u64,
    /// Timestamp
    pub timestamp: i64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded, ordered collection of events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<WrapperEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a log holding at most `MAX_EVENTS`
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    /// Create a log holding at most `capacity` events (minimum one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add an event, dropping the oldest when full
    pub fn push(&mut self, event: WrapperEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// All retained events, oldest first
    pub fn events(&self) -> Vec<WrapperEvent> {
        self.events.iter().cloned().collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&WrapperEvent> {
        self.events.back()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&WrapperEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Hash chain over all retained events
    pub fn digest(&self) -> Hash {
        self.events.iter().fold(Hash::zero(), |acc, event| {
            let mut data = Vec::with_capacity(64);
            data.extend_from_slice(acc.as_bytes());
            data.extend_from_slice(event.hash().as_bytes());
            Hash::sha256(&data)
        })
    }
}
