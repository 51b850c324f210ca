//! Identity records and their status lifecycle.
//!
//! Records progress `PendingVerification -> Active -> Frozen`. `Frozen` is
//! terminal: a frozen fingerprint stays claimed forever and can never be
//! registered again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BiometricBundle, Fingerprint, IdentityError, Result};

/// Status of an identity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityStatus {
    /// Registered but awaiting out-of-band verification.
    PendingVerification,
    /// Usable for verification.
    Active,
    /// Permanently frozen.
    Frozen,
}

impl IdentityStatus {
    /// Whether the identity can be verified against.
    pub fn is_usable(&self) -> bool {
        matches!(self, IdentityStatus::Active)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IdentityStatus::Frozen)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: IdentityStatus) -> bool {
        matches!(
            (self, next),
            (IdentityStatus::PendingVerification, IdentityStatus::Active)
                | (IdentityStatus::Active, IdentityStatus::Frozen)
        )
    }

    /// Validate a transition and return the new status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` for anything other than
    /// `PendingVerification -> Active` or `Active -> Frozen`.
    pub fn transition(self, next: IdentityStatus) -> Result<IdentityStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IdentityError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::PendingVerification => "PENDING_VERIFICATION",
            IdentityStatus::Active => "ACTIVE",
            IdentityStatus::Frozen => "FROZEN",
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdentityStatus {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING_VERIFICATION" | "PENDING" => Ok(IdentityStatus::PendingVerification),
            "ACTIVE" => Ok(IdentityStatus::Active),
            "FROZEN" => Ok(IdentityStatus::Frozen),
            _ => Err(IdentityError::UnknownStatus(s.to_string())),
        }
    }
}

/// A live lease on a fingerprint, as reported by a lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockState {
    /// Holder that owns the lease.
    pub holder: String,
    /// When the lease lapses unless released first.
    pub expires_at: DateTime<Utc>,
}

impl LockState {
    /// Whether the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The ledger's record of a registered identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Fused fingerprint; the ledger key.
    pub fingerprint: Fingerprint,
    /// Channel digests presented at registration.
    pub biometric_bundle: BiometricBundle,
    /// Share indices presented at registration.
    pub shard_indices: Vec<u8>,
    /// Current status.
    pub status: IdentityStatus,
    /// When the record was first written.
    pub registered_at: DateTime<Utc>,
    /// Identifier of the registration request that wrote the record. A
    /// retried write that finds its own record recognizes it by this id.
    #[serde(default)]
    pub registration_id: Option<String>,
    /// Lease covering the fingerprint at lookup time. Never persisted.
    #[serde(skip, default)]
    pub lock_state: Option<LockState>,
}

impl IdentityRecord {
    /// Create a record with the given initial status.
    pub fn new(
        fingerprint: Fingerprint,
        biometric_bundle: BiometricBundle,
        mut shard_indices: Vec<u8>,
        status: IdentityStatus,
        registered_at: DateTime<Utc>,
    ) -> Self {
        shard_indices.sort_unstable();
        shard_indices.dedup();
        Self {
            fingerprint,
            biometric_bundle,
            shard_indices,
            status,
            registered_at,
            registration_id: None,
            lock_state: None,
        }
    }

    /// Tag the record with the request that writes it.
    pub fn with_registration_id(mut self, id: impl Into<String>) -> Self {
        self.registration_id = Some(id.into());
        self
    }

    /// Return a copy with the status advanced to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the transition is illegal.
    pub fn with_status(&self, next: IdentityStatus) -> Result<Self> {
        let status = self.status.transition(next)?;
        Ok(Self {
            status,
            lock_state: None,
            ..self.clone()
        })
    }
}
