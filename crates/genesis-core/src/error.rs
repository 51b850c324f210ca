//! Error types for orchestration.
//!
//! Every failure maps to a stable [`ErrorKind`] tag and an
//! [`ErrorCategory`]. Callers branch on the tag; only
//! [`ErrorCategory::Transient`] failures are worth retrying.

use genesis_cap::CapError;
use genesis_crypto::CryptoError;
use genesis_identity::IdentityError;
use genesis_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during orchestration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Share codec or hashing failure.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Fusion or identity model failure.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Ledger failure.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Risk scoring failure.
    #[error("Risk scoring error: {0}")]
    Cap(#[from] CapError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No record exists for the presented credentials.
    #[error("Unknown identity {0}")]
    UnknownIdentity(String),

    /// The identity is frozen and can no longer authenticate.
    #[error("Identity {0} is frozen")]
    IdentityFrozen(String),

    /// Another session already holds the identity.
    #[error("Identity already has an active session {active_session}")]
    SessionRejected {
        /// The live session.
        active_session: String,
    },

    /// No live session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller's deadline elapsed.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Deadline that elapsed.
        elapsed_ms: u64,
    },
}

/// Result type for orchestration.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Stable error tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Fewer populated biometric channels than required.
    InsufficientLayers,
    /// Fewer distinct valid shares than the threshold.
    InsufficientShares,
    /// A share failed its checksum or carries an impossible index.
    CorruptShare,
    /// Shares from different splits or with different parameters.
    MismatchedShares,
    /// Any other malformed input.
    InvalidInput,
    /// The fingerprint is already bound to a record.
    AlreadyRegistered,
    /// Another holder owns the fingerprint's lease.
    AlreadyLocked,
    /// Another session holds the identity.
    SessionRejected,
    /// The store failed or did not answer in time.
    LedgerUnavailable,
    /// The lease could not be acquired in time.
    LockTimeout,
    /// The caller's deadline elapsed.
    Timeout,
    /// The system random source failed.
    EntropyUnavailable,
    /// Illegal status transition.
    InvalidTransition,
    /// The identity is frozen.
    IdentityFrozen,
    /// No record for the presented credentials.
    UnknownIdentity,
    /// No such session.
    SessionNotFound,
    /// Stored data could not be decoded.
    CorruptRecord,
    /// Invalid configuration.
    InvalidConfiguration,
}

/// Coarse grouping of error tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The input itself is malformed. Never retried.
    InputValidation,
    /// An expected outcome of concurrent operation.
    Contention,
    /// Infrastructure hiccup; safe to retry with backoff.
    Transient,
    /// Illegal or terminal lifecycle state. Never retried.
    StateMachine,
    /// The service is misconfigured.
    Configuration,
}

impl ErrorKind {
    /// Category of this tag.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InsufficientLayers
            | ErrorKind::InsufficientShares
            | ErrorKind::CorruptShare
            | ErrorKind::MismatchedShares
            | ErrorKind::InvalidInput => ErrorCategory::InputValidation,
            ErrorKind::AlreadyRegistered
            | ErrorKind::AlreadyLocked
            | ErrorKind::SessionRejected => ErrorCategory::Contention,
            ErrorKind::LedgerUnavailable
            | ErrorKind::LockTimeout
            | ErrorKind::Timeout
            | ErrorKind::EntropyUnavailable => ErrorCategory::Transient,
            ErrorKind::InvalidTransition
            | ErrorKind::IdentityFrozen
            | ErrorKind::UnknownIdentity
            | ErrorKind::SessionNotFound
            | ErrorKind::CorruptRecord => ErrorCategory::StateMachine,
            ErrorKind::InvalidConfiguration => ErrorCategory::Configuration,
        }
    }
}

impl CoreError {
    /// Stable tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Crypto(e) => crypto_kind(e),
            CoreError::Identity(e) => identity_kind(e),
            CoreError::Ledger(e) => ledger_kind(e),
            CoreError::Cap(CapError::InvalidSignal(_)) => ErrorKind::InvalidInput,
            CoreError::Cap(_) | CoreError::Config(_) => ErrorKind::InvalidConfiguration,
            CoreError::UnknownIdentity(_) => ErrorKind::UnknownIdentity,
            CoreError::IdentityFrozen(_) => ErrorKind::IdentityFrozen,
            CoreError::SessionRejected { .. } => ErrorKind::SessionRejected,
            CoreError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            CoreError::InvalidRequest(_) => ErrorKind::InvalidInput,
            CoreError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

fn crypto_kind(e: &CryptoError) -> ErrorKind {
    match e {
        CryptoError::InsufficientShares { .. } => ErrorKind::InsufficientShares,
        CryptoError::CorruptShare { .. } => ErrorKind::CorruptShare,
        CryptoError::MismatchedShares(_) => ErrorKind::MismatchedShares,
        CryptoError::Rng(_) => ErrorKind::EntropyUnavailable,
        CryptoError::InvalidHashLength { .. }
        | CryptoError::InvalidHexFormat(_)
        | CryptoError::UnknownAlgorithm(_)
        | CryptoError::InvalidThreshold { .. }
        | CryptoError::EmptySecret => ErrorKind::InvalidInput,
    }
}

fn identity_kind(e: &IdentityError) -> ErrorKind {
    match e {
        IdentityError::Crypto(inner) => crypto_kind(inner),
        IdentityError::InsufficientLayers { .. } => ErrorKind::InsufficientLayers,
        IdentityError::InvalidStateTransition { .. } => ErrorKind::InvalidTransition,
        IdentityError::InvalidDigest { .. }
        | IdentityError::UnknownChannel(_)
        | IdentityError::UnknownStatus(_) => ErrorKind::InvalidInput,
    }
}

fn ledger_kind(e: &LedgerError) -> ErrorKind {
    match e {
        LedgerError::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
        LedgerError::AlreadyLocked { .. } => ErrorKind::AlreadyLocked,
        LedgerError::LockTimeout { .. } => ErrorKind::LockTimeout,
        LedgerError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
        LedgerError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        LedgerError::NotFound(_) => ErrorKind::UnknownIdentity,
        LedgerError::Serialization(_) => ErrorKind::CorruptRecord,
        LedgerError::Identity(inner) => identity_kind(inner),
    }
}

/// Error as reported to callers.
///
/// `{ "error": "AlreadyRegistered", "category": "Contention", "retryable": false, "message": "..." }`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable tag.
    pub error: ErrorKind,
    /// Category of the tag.
    pub category: ErrorCategory,
    /// Whether a retry may succeed.
    pub retryable: bool,
    /// Human-readable detail. Never contains biometric data.
    pub message: String,
}

impl From<&CoreError> for ErrorResponse {
    fn from(e: &CoreError) -> Self {
        let error = e.kind();
        let category = error.category();
        Self {
            error,
            category,
            retryable: category == ErrorCategory::Transient,
            message: e.to_string(),
        }
    }
}

impl From<CoreError> for ErrorResponse {
    fn from(e: CoreError) -> Self {
        Self::from(&e)
    }
}
