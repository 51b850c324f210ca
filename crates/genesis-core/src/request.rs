//! Request and response types.
//!
//! These are the shapes external collaborators exchange with the
//! orchestrator, serialized as camelCase JSON.

use chrono::{DateTime, Utc};
use genesis_cap::{RiskAction, RiskTier, SessionSignal, SignalBatch};
use genesis_crypto::SecretShare;
use genesis_identity::{BiometricBundle, Fingerprint, IdentityStatus};
use serde::{Deserialize, Serialize};

/// Request to bind a new identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Channel digests.
    pub biometric_bundle: BiometricBundle,
    /// Shares of the national-identity secret.
    pub shards: Vec<SecretShare>,
}

impl RegistrationRequest {
    /// Create a request.
    pub fn new(biometric_bundle: BiometricBundle, shards: Vec<SecretShare>) -> Self {
        Self {
            biometric_bundle,
            shards,
        }
    }
}

/// Outcome of a successful registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// The new identity.
    pub fingerprint: Fingerprint,
    /// Its initial status.
    pub status: IdentityStatus,
    /// When it was bound.
    pub registered_at: DateTime<Utc>,
}

/// Request to authenticate, or to continue, a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Session to continue. A new session is opened when absent or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Channel digests.
    pub biometric_bundle: BiometricBundle,
    /// Shares of the national-identity secret.
    pub shards: Vec<SecretShare>,
    /// Signals observed since the last verification.
    #[serde(default)]
    pub session_signals: Vec<SessionSignal>,
    /// When the signals were observed; defaults to now. Clamped to the
    /// server clock when scored, so it can never stretch risk decay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl VerificationRequest {
    /// Create a request for a new session with no signals.
    pub fn new(biometric_bundle: BiometricBundle, shards: Vec<SecretShare>) -> Self {
        Self {
            session_id: None,
            biometric_bundle,
            shards,
            session_signals: Vec::new(),
            observed_at: None,
        }
    }

    /// Continue an existing session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach signals.
    pub fn with_signals(mut self, signals: Vec<SessionSignal>) -> Self {
        self.session_signals = signals;
        self
    }

    /// Stamp the signals with an observation time.
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }

    /// The signals as a batch.
    pub fn signal_batch(&self) -> SignalBatch {
        SignalBatch::at(
            self.observed_at.unwrap_or_else(Utc::now),
            self.session_signals.clone(),
        )
    }
}

/// Outcome of a verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    /// Session the signals were scored against.
    pub session_id: String,
    /// Current risk tier.
    pub tier: RiskTier,
    /// Public status of the identity.
    pub status: IdentityStatus,
    /// Current risk score.
    pub risk_score: f64,
    /// What the caller should do.
    pub action: RiskAction,
}
