//! Capability gate consulted before every mutating operation.

use std::sync::atomic::{AtomicBool, Ordering};

/// Decides whether mutating operations may run
pub trait PauseGate: Send + Sync {
    /// True when mutating operations must be rejected
    fn is_paused(&self) -> bool;
}

/// Atomic on/off switch
#[derive(Debug, Default)]
pub struct PauseSwitch {
    paused: AtomicBool,
}

impl PauseSwitch {
    /// Create an open (unpaused) switch
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Open the gate
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl PauseGate for PauseSwitch {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume() {
        let gate = PauseSwitch::new();
        assert!(!gate.is_paused());
        gate.pause();
        assert!(gate.is_paused());
        gate.resume();
        assert!(!gate.is_paused());
    }
}
