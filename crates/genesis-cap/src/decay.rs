//! Risk decay toward zero.
//!
//! Accumulated risk halves every `half_life` with no new anomalies:
//!
//! ```text
//! score(t) = score(0) * 0.5 ^ (t / half_life)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CapError, Result};

/// Default half-life in seconds (5 minutes).
pub const DEFAULT_HALF_LIFE_SECS: u64 = 300;

/// Configuration for risk decay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayConfig {
    /// Seconds for risk to halve.
    pub half_life_secs: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_secs: DEFAULT_HALF_LIFE_SECS,
        }
    }
}

impl DecayConfig {
    /// Create a decay configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHalfLife` for a zero half-life.
    pub fn new(half_life_secs: u64) -> Result<Self> {
        if half_life_secs == 0 {
            return Err(CapError::InvalidHalfLife(half_life_secs));
        }
        Ok(Self { half_life_secs })
    }

    /// Multiplier applied after `elapsed_ms` milliseconds.
    ///
    /// Non-positive elapsed time (out-of-order batches, clock skew) applies
    /// no decay.
    #[must_use]
    pub fn factor(&self, elapsed_ms: i64) -> f64 {
        if elapsed_ms <= 0 {
            return 1.0;
        }
        let half_life_ms = (self.half_life_secs.max(1) as f64) * 1000.0;
        0.5f64.powf(elapsed_ms as f64 / half_life_ms)
    }
}

/// Decay `score` for the time between `from` and `to`.
#[must_use]
pub fn apply_decay(score: f64, config: &DecayConfig, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    score * config.factor((to - from).num_milliseconds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_half_life_halves() {
        let config = DecayConfig::default();
        let t0 = Utc::now();
        let decayed = apply_decay(8.0, &config, t0, t0 + Duration::seconds(300));
        assert!((decayed - 4.0).abs() < 1e-9);
        let twice = apply_decay(8.0, &config, t0, t0 + Duration::seconds(600));
        assert!((twice - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_time_no_decay() {
        let config = DecayConfig::default();
        let t0 = Utc::now();
        assert_eq!(apply_decay(5.0, &config, t0, t0), 5.0);
    }

    #[test]
    fn test_backwards_time_no_decay() {
        let config = DecayConfig::default();
        let t0 = Utc::now();
        assert_eq!(apply_decay(5.0, &config, t0, t0 - Duration::seconds(60)), 5.0);
    }

    #[test]
    fn test_zero_half_life_rejected() {
        assert_eq!(DecayConfig::new(0), Err(CapError::InvalidHalfLife(0)));
        assert_eq!(DecayConfig::new(60).unwrap().half_life_secs, 60);
    }

    #[test]
    fn test_factor_monotonic() {
        let config = DecayConfig::new(60).unwrap();
        let mut last = 1.0;
        for ms in (0..600_000).step_by(10_000) {
            let f = config.factor(ms);
            assert!(f <= last);
            assert!(f > 0.0);
            last = f;
        }
    }
}
