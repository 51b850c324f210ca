//! Error types for ledger operations.

use genesis_identity::{IdentityError, IdentityStatus};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The fingerprint is already bound to a record.
    ///
    /// Carries only the existing status, never the stored biometric data.
    #[error("Fingerprint already registered (status {status})")]
    AlreadyRegistered {
        /// Status of the existing record.
        status: IdentityStatus,
    },

    /// Another holder owns a live lease on the fingerprint.
    #[error("Fingerprint locked by {holder} for another {expires_in_ms}ms")]
    AlreadyLocked {
        /// Holder of the live lease.
        holder: String,
        /// Milliseconds until the lease lapses.
        expires_in_ms: u64,
    },

    /// The lease could not be acquired within the allowed wait.
    #[error("Lock acquisition timed out after {waited_ms}ms")]
    LockTimeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The store failed or did not answer in time.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Illegal status transition.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: IdentityStatus,
        /// Requested status.
        to: IdentityStatus,
    },

    /// No record exists for the fingerprint.
    #[error("No record for fingerprint {0}")]
    NotFound(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Identity-level failure.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl LedgerError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::LedgerUnavailable(_) | LedgerError::LockTimeout { .. }
        )
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
