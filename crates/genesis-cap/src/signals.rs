//! Session signals.
//!
//! A [`SignalBatch`] is everything observed about a session since the last
//! evaluation, stamped with the time it was observed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CapError, Result};

/// One observation about a live session.
///
/// On the wire: `{ "type": "geolocationJump", "distanceKm": 820.0 }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionSignal {
    /// The session moved a physically implausible distance.
    GeolocationJump {
        /// Distance from the previous location in kilometres.
        #[serde(rename = "distanceKm")]
        distance_km: f64,
    },
    /// Behavioral biometrics diverged from the enrolled pattern.
    BehavioralDeviation {
        /// Normalized deviation in `[0, 1]`.
        deviation: f64,
    },
    /// The session is running on a device not seen before.
    NewDevice,
    /// The holder failed a step-up challenge.
    FailedChallenge,
    /// Nothing anomalous.
    Nominal,
}

impl SessionSignal {
    /// Reject values no sensor can produce.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignal` for negative or non-finite distances and
    /// deviations outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            SessionSignal::GeolocationJump { distance_km } => {
                if !distance_km.is_finite() || distance_km < 0.0 {
                    return Err(CapError::InvalidSignal(format!(
                        "geolocation distance {} km",
                        distance_km
                    )));
                }
            }
            SessionSignal::BehavioralDeviation { deviation } => {
                if !(0.0..=1.0).contains(&deviation) {
                    return Err(CapError::InvalidSignal(format!(
                        "behavioral deviation {}",
                        deviation
                    )));
                }
            }
            SessionSignal::NewDevice | SessionSignal::FailedChallenge | SessionSignal::Nominal => {}
        }
        Ok(())
    }

    /// Whether the signal reports an anomaly.
    pub fn is_anomalous(&self) -> bool {
        !matches!(self, SessionSignal::Nominal)
    }
}

/// Signals observed together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBatch {
    /// When the signals were observed.
    pub observed_at: DateTime<Utc>,
    /// The observations.
    #[serde(default)]
    pub signals: Vec<SessionSignal>,
}

impl SignalBatch {
    /// Batch observed now.
    pub fn new(signals: Vec<SessionSignal>) -> Self {
        Self::at(Utc::now(), signals)
    }

    /// Batch observed at a specific time.
    pub fn at(observed_at: DateTime<Utc>, signals: Vec<SessionSignal>) -> Self {
        Self {
            observed_at,
            signals,
        }
    }

    /// Empty batch observed now; only applies decay.
    pub fn nominal() -> Self {
        Self::new(Vec::new())
    }

    /// Validate every signal in the batch.
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidSignal` found.
    pub fn validate(&self) -> Result<()> {
        self.signals.iter().try_for_each(SessionSignal::validate)
    }
}
