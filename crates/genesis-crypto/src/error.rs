//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid hash length.
    #[error("Invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength {
        /// Expected hash length.
        expected: usize,
        /// Actual hash length.
        actual: usize,
    },

    /// Invalid hex string format.
    #[error("Invalid hex string: {0}")]
    InvalidHexFormat(String),

    /// Unrecognized hash algorithm name.
    #[error("Unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Threshold parameters do not satisfy `1 < k <= n <= 255`.
    #[error("Invalid threshold parameters: k={threshold}, n={total}")]
    InvalidThreshold {
        /// Requested threshold (k).
        threshold: usize,
        /// Requested share count (n).
        total: usize,
    },

    /// The secret to split was empty.
    #[error("Cannot split an empty secret")]
    EmptySecret,

    /// Fewer than `required` distinct valid shares were supplied.
    #[error("Insufficient shares: required {required}, provided {provided}")]
    InsufficientShares {
        /// Shares needed for reconstruction.
        required: usize,
        /// Distinct valid shares supplied.
        provided: usize,
    },

    /// A share failed its integrity check or carries an impossible index.
    #[error("Corrupt share at index {index}")]
    CorruptShare {
        /// Index of the offending share.
        index: u8,
    },

    /// Shares belong to different splits or disagree on parameters.
    #[error("Shares do not belong to the same split: {0}")]
    MismatchedShares(String),

    /// Random number generation failed.
    #[error("Random number generation failed: {0}")]
    Rng(String),
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
