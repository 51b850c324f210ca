//! The CAP risk scorer.
//!
//! `score(state, batch)` is a pure function: decay the prior score for the
//! time since it was last evaluated, add the batch's weighted penalties,
//! clamp to `[RISK_MIN, RISK_MAX]`, and re-tier.

use serde::{Deserialize, Serialize};

use crate::decay::DecayConfig;
use crate::score::{RiskThresholds, SessionRiskState, RISK_MAX, RISK_MIN};
use crate::signals::{SessionSignal, SignalBatch};
use crate::{CapError, Result};

/// Penalty weights for session signals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskWeights {
    /// Jumps at or beyond this distance get the far penalty.
    pub geo_far_km: f64,
    /// Penalty for a far jump.
    pub geo_far_penalty: f64,
    /// Jumps at or beyond this distance (but short of far) get the near penalty.
    pub geo_near_km: f64,
    /// Penalty for a near jump.
    pub geo_near_penalty: f64,
    /// Multiplier applied to behavioral deviation.
    pub behavioral_multiplier: f64,
    /// Penalty for an unseen device.
    pub new_device_penalty: f64,
    /// Penalty for a failed challenge.
    pub failed_challenge_penalty: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            geo_far_km: 500.0,
            geo_far_penalty: 5.0,
            geo_near_km: 50.0,
            geo_near_penalty: 2.0,
            behavioral_multiplier: 4.0,
            new_device_penalty: 2.0,
            failed_challenge_penalty: 3.0,
        }
    }
}

impl RiskWeights {
    /// Check that every weight is finite and non-negative, and that the
    /// near distance does not exceed the far one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWeight` naming the first offending weight.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("geoFarKm", self.geo_far_km),
            ("geoFarPenalty", self.geo_far_penalty),
            ("geoNearKm", self.geo_near_km),
            ("geoNearPenalty", self.geo_near_penalty),
            ("behavioralMultiplier", self.behavioral_multiplier),
            ("newDevicePenalty", self.new_device_penalty),
            ("failedChallengePenalty", self.failed_challenge_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(CapError::InvalidWeight { name, value });
            }
        }
        if self.geo_near_km > self.geo_far_km {
            return Err(CapError::InvalidWeight {
                name: "geoNearKm",
                value: self.geo_near_km,
            });
        }
        Ok(())
    }

    /// Penalty contributed by one signal.
    pub fn penalty(&self, signal: &SessionSignal) -> f64 {
        match *signal {
            SessionSignal::GeolocationJump { distance_km } if distance_km >= self.geo_far_km => {
                self.geo_far_penalty
            }
            SessionSignal::GeolocationJump { distance_km } if distance_km >= self.geo_near_km => {
                self.geo_near_penalty
            }
            SessionSignal::GeolocationJump { .. } => 0.0,
            SessionSignal::BehavioralDeviation { deviation } => {
                deviation.clamp(0.0, 1.0) * self.behavioral_multiplier
            }
            SessionSignal::NewDevice => self.new_device_penalty,
            SessionSignal::FailedChallenge => self.failed_challenge_penalty,
            SessionSignal::Nominal => 0.0,
        }
    }
}

/// Scores session risk.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RiskScorer {
    weights: RiskWeights,
    thresholds: RiskThresholds,
    decay: DecayConfig,
}

impl RiskScorer {
    /// Create a scorer.
    ///
    /// # Errors
    ///
    /// Returns an error if any component fails validation.
    pub fn new(weights: RiskWeights, thresholds: RiskThresholds, decay: DecayConfig) -> Result<Self> {
        weights.validate()?;
        thresholds.validate()?;
        DecayConfig::new(decay.half_life_secs)?;
        Ok(Self {
            weights,
            thresholds,
            decay,
        })
    }

    /// Penalty weights.
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Tier thresholds.
    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Decay configuration.
    pub fn decay(&self) -> &DecayConfig {
        &self.decay
    }

    /// Total penalty of a batch.
    pub fn batch_penalty(&self, batch: &SignalBatch) -> f64 {
        batch.signals.iter().map(|s| self.weights.penalty(s)).sum()
    }

    /// Compute the next state of a session.
    ///
    /// Pure: the same inputs always produce the same output. Signals are
    /// assumed validated; out-of-range values are clamped.
    #[must_use]
    pub fn score(&self, state: &SessionRiskState, batch: &SignalBatch) -> SessionRiskState {
        let elapsed_ms = (batch.observed_at - state.last_evaluated_at).num_milliseconds();
        let decayed = state.risk_score * self.decay.factor(elapsed_ms);
        let raw = decayed + self.batch_penalty(batch);
        let risk_score = if raw.is_nan() {
            RISK_MAX
        } else {
            raw.clamp(RISK_MIN, RISK_MAX)
        };

        SessionRiskState {
            session_id: state.session_id.clone(),
            fingerprint: state.fingerprint.clone(),
            risk_score,
            last_evaluated_at: batch.observed_at.max(state.last_evaluated_at),
            tier: self.thresholds.tier_for(risk_score),
        }
    }
}
