//! Error types for the synthwrap ledger.
//!
//! Every failure a caller can observe from the engine or its collaborators
//! is one variant of [`Error`]. Failures are terminal for the call: nothing
//! is retried inside the engine.

use thiserror::Error;

/// Result type alias for synthwrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the synthwrap ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Gate Errors
    // ═══════════════════════════════════════════════════════════════════

    /// The capability gate is closed
    #[error("Wrapper is paused")]
    Paused,

    // ═══════════════════════════════════════════════════════════════════
    // Funding Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller has not authorized enough of the asset to the engine
    #[error("Allowance not high enough: required {required}, available {available}")]
    InsufficientAllowance {
        /// Amount the operation needs to pull
        required: u128,
        /// Amount currently authorized
        available: u128,
    },

    /// Caller does not hold enough of the asset
    #[error("Balance is too low: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needs
        required: u128,
        /// Amount currently held
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Reserve Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Reserves are at or above the collateral cap
    #[error("Contract has no spare capacity to mint")]
    NoCapacity,

    /// No collateral is held, so nothing can be redeemed
    #[error("Contract cannot burn for collateral, reserve balance is zero")]
    NoReserves,

    // ═══════════════════════════════════════════════════════════════════
    // Fee Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Requested claim is larger than the escrow counter
    #[error("Claim of {requested} exceeds escrowed fees {escrowed}")]
    ClaimExceedsEscrow {
        /// Requested claim amount
        requested: u128,
        /// Current escrow counter
        escrowed: u128,
    },

    /// The oracle reports the rate for this currency as invalid
    #[error("Rate for {0} is invalid or stale")]
    StaleRate(String),

    /// Currency key not handled by this wrapper
    #[error("Unknown currency key: {0}")]
    UnknownCurrency(String),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Intermediate or final value does not fit the integer width
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Divisor was zero
    #[error("Division by zero")]
    DivideByZero,

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Native asset sent without going through mint
    #[error("Direct deposits are not accepted, use mint")]
    DirectDepositRejected,

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A required collaborator was not supplied
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    // ═══════════════════════════════════════════════════════════════════
    // Configuration / Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,
}

impl Error {
    /// Returns true if the caller can fix the inputs and resubmit
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Paused
                | Error::InsufficientAllowance { .. }
                | Error::InsufficientBalance { .. }
                | Error::NoCapacity
                | Error::NoReserves
                | Error::ClaimExceedsEscrow { .. }
                | Error::StaleRate(_)
                | Error::ZeroAmount
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::ArithmeticOverflow { .. } | Error::DivideByZero | Error::Lock
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Gate errors: 1xxx
            Error::Paused => 1001,

            // Funding errors: 2xxx
            Error::InsufficientAllowance { .. } => 2001,
            Error::InsufficientBalance { .. } => 2002,

            // Reserve errors: 3xxx
            Error::NoCapacity => 3001,
            Error::NoReserves => 3002,

            // Fee errors: 4xxx
            Error::ClaimExceedsEscrow { .. } => 4001,
            Error::StaleRate(_) => 4002,
            Error::UnknownCurrency(_) => 4003,

            // Arithmetic errors: 5xxx
            Error::ArithmeticOverflow { .. } => 5001,
            Error::DivideByZero => 5002,

            // Validation errors: 6xxx
            Error::ZeroAmount => 6001,
            Error::DirectDepositRejected => 6002,
            Error::InvalidParameter { .. } => 6003,
            Error::MissingDependency(_) => 6004,

            // Configuration / serialization errors: 7xxx
            Error::Config(_) => 7001,
            Error::Serialization(_) => 7002,
            Error::Deserialization(_) => 7003,

            // Internal errors: 9xxx
            Error::Lock => 9001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::Paused.code(),
            Error::InsufficientAllowance { required: 0, available: 0 }.code(),
            Error::InsufficientBalance { required: 0, available: 0 }.code(),
            Error::NoCapacity.code(),
            Error::NoReserves.code(),
            Error::ClaimExceedsEscrow { requested: 0, escrowed: 0 }.code(),
            Error::StaleRate("ETH".into()).code(),
            Error::ArithmeticOverflow { operation: "".into() }.code(),
            Error::DivideByZero.code(),
            Error::DirectDepositRejected.code(),
            Error::Lock.code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientAllowance {
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::NoCapacity.is_recoverable());
        assert!(Error::StaleRate("ETH".into()).is_recoverable());
        assert!(!Error::DivideByZero.is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::ArithmeticOverflow { operation: "test".into() }.is_critical());
        assert!(!Error::NoReserves.is_critical());
    }
}
