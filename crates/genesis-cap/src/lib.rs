//! # genesis-cap
//!
//! Continuous Authentication Protocol: per-session risk re-scoring.
//!
//! Provides:
//! - Session signals and signal batches
//! - Exponential half-life decay of accumulated risk
//! - Risk tiers and the actions they call for
//! - [`RiskScorer`], a pure function from `(state, batch)` to the next state
//!
//! The scorer never touches identity records. Escalating a session to a
//! frozen identity is the caller's decision.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod decay;
pub mod error;
pub mod score;
pub mod scorer;
pub mod signals;

#[cfg(test)]
mod proptests;

pub use decay::{apply_decay, DecayConfig, DEFAULT_HALF_LIFE_SECS};
pub use error::{CapError, Result};
pub use score::{RiskAction, RiskThresholds, RiskTier, SessionRiskState, RISK_MAX, RISK_MIN};
pub use scorer::{RiskScorer, RiskWeights};
pub use signals::{SessionSignal, SignalBatch};
