//! Time-bounded per-fingerprint leases.
//!
//! A lease serializes mutating operations on one fingerprint. Leases expire
//! on their own, so a crashed holder can never wedge a fingerprint; an
//! expired lease is taken over with a compare-and-swap.

use std::time::Duration;

use chrono::{DateTime, Utc};
use genesis_identity::{Fingerprint, LockState};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{IdentityLedger, Result};

/// Size of a lease token identifier.
pub const TOKEN_ID_SIZE: usize = 16;

/// Persisted form of a lease.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Random identifier distinguishing this acquisition.
    pub token_id: [u8; TOKEN_ID_SIZE],
    /// Holder name.
    pub holder: String,
    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lease lapses.
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    pub(crate) fn new(holder: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        let mut token_id = [0u8; TOKEN_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut token_id);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
        let expires_at = now
            .checked_add_signed(chrono::Duration::milliseconds(ttl_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token_id,
            holder: holder.to_string(),
            acquired_at: now,
            expires_at,
        }
    }

    /// Whether the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Milliseconds remaining at `now`, zero once expired.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_milliseconds().max(0) as u64
    }

    /// Public view attached to looked-up records.
    pub fn state(&self) -> LockState {
        LockState {
            holder: self.holder.clone(),
            expires_at: self.expires_at,
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Proof of a held lease, presented to mutating ledger calls.
#[derive(Clone, PartialEq, Eq)]
pub struct LockToken {
    fingerprint: Fingerprint,
    token_id: [u8; TOKEN_ID_SIZE],
    holder: String,
    expires_at: DateTime<Utc>,
}

impl LockToken {
    pub(crate) fn new(fingerprint: Fingerprint, record: &LockRecord) -> Self {
        Self {
            fingerprint,
            token_id: record.token_id,
            holder: record.holder.clone(),
            expires_at: record.expires_at,
        }
    }

    /// Fingerprint the lease covers.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Holder name.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// When the lease lapses.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether this token matches a stored lease.
    pub fn matches(&self, record: &LockRecord) -> bool {
        self.token_id == record.token_id
    }
}

impl std::fmt::Debug for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockToken")
            .field("fingerprint", &self.fingerprint.short())
            .field("token", &hex::encode(&self.token_id[..4]))
            .field("holder", &self.holder)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Scoped lease that is released when it goes out of scope.
///
/// Prefer [`LockGuard::release`], which reports the outcome. When a guard is
/// dropped instead (an early `?` return, or a cancelled future), release is
/// scheduled on the current tokio runtime. Outside a runtime the lease is
/// left to expire.
pub struct LockGuard {
    ledger: IdentityLedger,
    token: LockToken,
    armed: bool,
}

impl LockGuard {
    pub(crate) fn new(ledger: IdentityLedger, token: LockToken) -> Self {
        Self {
            ledger,
            token,
            armed: true,
        }
    }

    /// Token for passing to mutating ledger calls.
    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Release the lease now.
    ///
    /// Returns `false` if the lease had already expired and been taken over.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` if the store cannot be reached.
    pub async fn release(mut self) -> Result<bool> {
        self.armed = false;
        self.ledger.release_lock(&self.token).await
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("token", &self.token)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let fingerprint = self.token.fingerprint().short();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ledger = self.ledger.clone();
                let token = self.token.clone();
                debug!(fingerprint = %fingerprint, "Releasing dropped lock guard");
                handle.spawn(async move {
                    if let Err(e) = ledger.release_lock(&token).await {
                        warn!(
                            fingerprint = %token.fingerprint().short(),
                            error = %e,
                            "Deferred lock release failed; lease will expire"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(
                    fingerprint = %fingerprint,
                    "Lock guard dropped outside a runtime; lease will expire"
                );
            }
        }
    }
}
