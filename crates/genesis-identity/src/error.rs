//! Error types for identity operations.

use thiserror::Error;

/// Errors that can occur while building bundles or fusing identities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] genesis_crypto::CryptoError),

    /// Not enough populated biometric channels to fuse.
    #[error("Insufficient biometric layers: {present} present, {required} required")]
    InsufficientLayers {
        /// Minimum number of populated channels.
        required: usize,
        /// Number of populated channels supplied.
        present: usize,
    },

    /// A biometric digest was malformed.
    #[error("Invalid digest for {channel}: {reason}")]
    InvalidDigest {
        /// Channel the digest was supplied for.
        channel: String,
        /// Reason for invalidity.
        reason: String,
    },

    /// Unrecognized biometric channel name.
    #[error("Unknown biometric channel: {0}")]
    UnknownChannel(String),

    /// Unrecognized identity status name.
    #[error("Unknown identity status: {0}")]
    UnknownStatus(String),

    /// Invalid identity status transition.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current status.
        from: String,
        /// Attempted status.
        to: String,
    },
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
