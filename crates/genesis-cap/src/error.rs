//! Error types for risk scoring.

use thiserror::Error;

/// Errors that can occur when configuring the scorer or reading signals.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapError {
    /// Tier thresholds are out of order or out of range.
    #[error("Invalid risk thresholds: medium {medium}, high {high}")]
    InvalidThresholds {
        /// Medium tier threshold.
        medium: f64,
        /// High tier threshold.
        high: f64,
    },

    /// A penalty weight is negative or not finite.
    #[error("Invalid weight {name}: {value}")]
    InvalidWeight {
        /// Weight name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Decay half-life must be positive.
    #[error("Invalid decay half-life: {0}s")]
    InvalidHalfLife(u64),

    /// A session signal carried an impossible value.
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),
}

/// Result type for risk scoring.
pub type Result<T> = std::result::Result<T, CapError>;
