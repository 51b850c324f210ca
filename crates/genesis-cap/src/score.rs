//! Risk tiers and session risk state.

use chrono::{DateTime, Utc};
use genesis_identity::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::{CapError, Result};

/// Lowest possible risk score.
pub const RISK_MIN: f64 = 0.0;

/// Highest possible risk score.
pub const RISK_MAX: f64 = 10.0;

/// Default score at which a session becomes medium risk.
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 3.0;

/// Default score at which a session becomes high risk.
pub const DEFAULT_HIGH_THRESHOLD: f64 = 6.0;

/// Coarse risk level of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Pass silently.
    Low,
    /// Soft challenge.
    Medium,
    /// Demand re-verification.
    High,
}

impl RiskTier {
    /// Action the caller should take for this tier.
    pub fn action(&self) -> RiskAction {
        match self {
            RiskTier::Low => RiskAction::Pass,
            RiskTier::Medium => RiskAction::SoftChallenge,
            RiskTier::High => RiskAction::Reverify,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should do about a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskAction {
    /// Continue without friction.
    Pass,
    /// Ask for a lightweight step-up.
    SoftChallenge,
    /// Require full re-verification.
    Reverify,
}

/// Score boundaries between tiers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskThresholds {
    /// Scores at or above this are at least `Medium`.
    pub medium: f64,
    /// Scores at or above this are `High`.
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: DEFAULT_MEDIUM_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl RiskThresholds {
    /// Create thresholds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidThresholds` unless `0 < medium < high <= RISK_MAX`.
    pub fn new(medium: f64, high: f64) -> Result<Self> {
        let thresholds = Self { medium, high };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Check ordering and range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidThresholds` unless `0 < medium < high <= RISK_MAX`.
    pub fn validate(&self) -> Result<()> {
        let ordered = self.medium > RISK_MIN && self.medium < self.high && self.high <= RISK_MAX;
        if !ordered {
            return Err(CapError::InvalidThresholds {
                medium: self.medium,
                high: self.high,
            });
        }
        Ok(())
    }

    /// Tier for a score.
    pub fn tier_for(&self, score: f64) -> RiskTier {
        if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Risk state of one live session. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRiskState {
    /// Session identifier.
    pub session_id: String,
    /// Identity the session authenticated as.
    pub fingerprint: Fingerprint,
    /// Accumulated risk in `[RISK_MIN, RISK_MAX]`.
    pub risk_score: f64,
    /// When the score was last recomputed.
    pub last_evaluated_at: DateTime<Utc>,
    /// Tier for `risk_score`.
    pub tier: RiskTier,
}

impl SessionRiskState {
    /// Fresh session with zero risk.
    pub fn new(session_id: impl Into<String>, fingerprint: Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            fingerprint,
            risk_score: RISK_MIN,
            last_evaluated_at: now,
            tier: RiskTier::Low,
        }
    }

    /// Action for the current tier.
    pub fn action(&self) -> RiskAction {
        self.tier.action()
    }
}
