//! The identity ledger.
//!
//! ## Guarantees
//!
//! - A fingerprint maps to at most one record, enforced by the store's
//!   conditional insert; concurrent registrations of the same fingerprint
//!   have exactly one winner.
//! - Record writes check the fingerprint's lease in the same atomic store
//!   operation, so a write never lands under another holder's live lease.
//! - Status transitions are compare-and-swap on the stored record bytes, so
//!   concurrent transitions linearize and a stale writer never clobbers a
//!   newer status.
//! - Every store call is bounded by `store_timeout`.
//! - Operations on different fingerprints touch different keys and never
//!   wait on each other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genesis_identity::{Fingerprint, IdentityRecord, IdentityStatus, LockState};
use tracing::{debug, info, warn};

use crate::lock::{LockGuard, LockRecord, LockToken};
use crate::storage::{CasOutcome, Keyspace, LedgerStore};
use crate::{LedgerError, Result};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on compare-and-swap retries before reporting contention.
const MAX_CAS_ATTEMPTS: usize = 16;

/// First delay between lock polling attempts.
const LOCK_POLL_INITIAL: Duration = Duration::from_millis(5);

/// Longest delay between lock polling attempts.
const LOCK_POLL_MAX: Duration = Duration::from_millis(100);

/// Ledger tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Bound on each store call.
    pub store_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Authoritative fingerprint → record mapping.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct IdentityLedger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl std::fmt::Debug for IdentityLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityLedger")
            .field("backend", &self.store.backend_name())
            .field("records", &self.store.len(Keyspace::Records))
            .field("config", &self.config)
            .finish()
    }
}

impl IdentityLedger {
    /// Create a ledger over a store with default tuning.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    /// Create a ledger with explicit tuning.
    pub fn with_config(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Ledger tuning.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Name of the underlying store.
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Number of registered identities.
    pub fn record_count(&self) -> usize {
        self.store.len(Keyspace::Records)
    }

    /// Number of stored leases, live or expired.
    pub fn lock_count(&self) -> usize {
        self.store.len(Keyspace::Locks)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(LedgerError::LedgerUnavailable(format!(
                    "{} exceeded {}ms",
                    op,
                    self.config.store_timeout.as_millis()
                )))
            }
        }
    }

    async fn load_lock(&self, fingerprint: &Fingerprint) -> Result<Option<(Vec<u8>, LockRecord)>> {
        let bytes = self
            .bounded("get lock", self.store.get(Keyspace::Locks, fingerprint.as_bytes()))
            .await?;
        match bytes {
            Some(bytes) => {
                let record = LockRecord::from_bytes(&bytes)?;
                Ok(Some((bytes, record)))
            }
            None => Ok(None),
        }
    }

    /// Gate for lease-checked record writes: passes when no lease is stored,
    /// the stored lease has expired, or `token` holds it.
    fn lease_gate(
        token: Option<&LockToken>,
    ) -> impl Fn(Option<&[u8]>) -> Result<()> + Send + Sync + '_ {
        move |held| {
            let Some(bytes) = held else {
                return Ok(());
            };
            let lease = LockRecord::from_bytes(bytes)?;
            let now = Utc::now();
            if lease.is_expired_at(now) || token.is_some_and(|t| t.matches(&lease)) {
                return Ok(());
            }
            Err(LedgerError::AlreadyLocked {
                expires_in_ms: lease.remaining_ms(now),
                holder: lease.holder,
            })
        }
    }

    // ==================== Records ====================

    /// Atomically bind a record to its fingerprint.
    ///
    /// The lease check and the insert are one store operation. A record
    /// tagged with a registration id that finds its own earlier write (a
    /// retry after a lost reply) succeeds with the stored record.
    ///
    /// # Errors
    ///
    /// - `AlreadyRegistered` with the existing status if the fingerprint is taken
    /// - `AlreadyLocked` if another holder's live lease covers the fingerprint
    /// - `LedgerUnavailable` on store failure or timeout
    pub async fn register_if_absent(
        &self,
        record: IdentityRecord,
        lock: Option<&LockToken>,
    ) -> Result<IdentityRecord> {
        let fingerprint = record.fingerprint.clone();
        let gate = Self::lease_gate(lock);

        let bytes = bincode::serialize(&record)?;
        let existing = self
            .bounded(
                "insert record",
                self.store
                    .insert_record_if_absent(fingerprint.as_bytes(), bytes, &gate),
            )
            .await?;

        match existing {
            None => {
                info!(
                    fingerprint = %fingerprint.short(),
                    status = %record.status,
                    "Identity registered"
                );
                Ok(record)
            }
            Some(bytes) => {
                let existing: IdentityRecord = bincode::deserialize(&bytes)?;
                if record.registration_id.is_some()
                    && existing.registration_id == record.registration_id
                {
                    debug!(
                        fingerprint = %fingerprint.short(),
                        "Registration already applied by this request"
                    );
                    return Ok(existing);
                }
                debug!(
                    fingerprint = %fingerprint.short(),
                    status = %existing.status,
                    "Registration rejected: fingerprint already bound"
                );
                Err(LedgerError::AlreadyRegistered {
                    status: existing.status,
                })
            }
        }
    }

    /// Read a record, with any live lease attached as `lock_state`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<IdentityRecord>> {
        let bytes = self
            .bounded(
                "get record",
                self.store.get(Keyspace::Records, fingerprint.as_bytes()),
            )
            .await?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let mut record: IdentityRecord = bincode::deserialize(&bytes)?;
        record.lock_state = self.lock_state(fingerprint).await?;
        Ok(Some(record))
    }

    /// Live lease on `fingerprint`, if any.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn lock_state(&self, fingerprint: &Fingerprint) -> Result<Option<LockState>> {
        let now = Utc::now();
        Ok(self
            .load_lock(fingerprint)
            .await?
            .filter(|(_, lease)| !lease.is_expired_at(now))
            .map(|(_, lease)| lease.state()))
    }

    /// Move a record along `PendingVerification -> Active -> Frozen`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record exists
    /// - `InvalidTransition` for an illegal transition
    /// - `AlreadyLocked` if another holder's live lease covers the fingerprint
    /// - `LedgerUnavailable` on store failure, timeout, or persistent contention
    pub async fn transition_status(
        &self,
        fingerprint: &Fingerprint,
        new_status: IdentityStatus,
        lock: Option<&LockToken>,
    ) -> Result<IdentityRecord> {
        let gate = Self::lease_gate(lock);
        let mut current = self
            .bounded(
                "get record",
                self.store.get(Keyspace::Records, fingerprint.as_bytes()),
            )
            .await?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(bytes) = current else {
                return Err(LedgerError::NotFound(fingerprint.short()));
            };
            let record: IdentityRecord = bincode::deserialize(&bytes)?;
            if !record.status.can_transition_to(new_status) {
                return Err(LedgerError::InvalidTransition {
                    from: record.status,
                    to: new_status,
                });
            }
            let updated = record.with_status(new_status)?;
            let new_bytes = bincode::serialize(&updated)?;

            let outcome = self
                .bounded(
                    "swap record",
                    self.store.compare_and_swap_record(
                        fingerprint.as_bytes(),
                        Some(bytes.as_slice()),
                        Some(new_bytes),
                        &gate,
                    ),
                )
                .await?;

            match outcome {
                CasOutcome::Swapped => {
                    info!(
                        fingerprint = %fingerprint.short(),
                        from = %record.status,
                        to = %new_status,
                        "Identity status changed"
                    );
                    return Ok(updated);
                }
                CasOutcome::Conflict(latest) => {
                    debug!(fingerprint = %fingerprint.short(), "Status swap raced; retrying");
                    current = latest;
                }
            }
        }

        Err(LedgerError::LedgerUnavailable(format!(
            "status of {} still contended after {} attempts",
            fingerprint.short(),
            MAX_CAS_ATTEMPTS
        )))
    }

    /// Fingerprints of all registered identities.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn fingerprints(&self) -> Result<Vec<Fingerprint>> {
        let keys = self
            .bounded("list records", self.store.keys(Keyspace::Records))
            .await?;
        keys.iter()
            .map(|k| Fingerprint::from_bytes(k).map_err(LedgerError::from))
            .collect()
    }

    // ==================== Leases ====================

    /// Take an exclusive lease on `fingerprint`.
    ///
    /// An expired lease is taken over atomically.
    ///
    /// # Errors
    ///
    /// - `AlreadyLocked` if another live lease exists
    /// - `LedgerUnavailable` on store failure or timeout
    pub async fn acquire_lock(
        &self,
        fingerprint: &Fingerprint,
        holder: &str,
        ttl: Duration,
    ) -> Result<LockToken> {
        let key = fingerprint.as_bytes();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let now = Utc::now();
            let lease = LockRecord::new(holder, ttl, now);
            let bytes = lease.to_bytes()?;

            let existing = self
                .bounded(
                    "insert lock",
                    self.store.insert_if_absent(Keyspace::Locks, key, bytes.clone()),
                )
                .await?;

            let Some(existing_bytes) = existing else {
                debug!(fingerprint = %fingerprint.short(), holder, "Lock acquired");
                return Ok(LockToken::new(fingerprint.clone(), &lease));
            };

            let current = LockRecord::from_bytes(&existing_bytes)?;
            if !current.is_expired_at(now) {
                let expires_in_ms = current.remaining_ms(now);
                return Err(LedgerError::AlreadyLocked {
                    holder: current.holder,
                    expires_in_ms,
                });
            }

            let outcome = self
                .bounded(
                    "take over lock",
                    self.store.compare_and_swap(
                        Keyspace::Locks,
                        key,
                        Some(existing_bytes.as_slice()),
                        Some(bytes),
                    ),
                )
                .await?;
            if outcome.is_swapped() {
                debug!(
                    fingerprint = %fingerprint.short(),
                    holder,
                    previous = %current.holder,
                    "Expired lock taken over"
                );
                return Ok(LockToken::new(fingerprint.clone(), &lease));
            }
        }

        Err(LedgerError::LedgerUnavailable(format!(
            "lock on {} still contended after {} attempts",
            fingerprint.short(),
            MAX_CAS_ATTEMPTS
        )))
    }

    /// Take a lease, polling with backoff for up to `wait`.
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if the lease stays held for the whole wait
    /// - `LedgerUnavailable` on store failure or timeout
    pub async fn acquire_lock_within(
        &self,
        fingerprint: &Fingerprint,
        holder: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockToken> {
        let started = tokio::time::Instant::now();
        let deadline = started + wait;
        let mut backoff = LOCK_POLL_INITIAL;

        loop {
            match self.acquire_lock(fingerprint, holder, ttl).await {
                Err(LedgerError::AlreadyLocked {
                    holder: owner,
                    expires_in_ms,
                }) => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        let waited_ms = now.duration_since(started).as_millis() as u64;
                        warn!(
                            fingerprint = %fingerprint.short(),
                            owner = %owner,
                            waited_ms,
                            "Lock wait exhausted"
                        );
                        return Err(LedgerError::LockTimeout { waited_ms });
                    }
                    let remaining = Duration::from_millis(expires_in_ms.max(1));
                    let sleep = backoff.min(remaining).min(deadline - now);
                    debug!(
                        fingerprint = %fingerprint.short(),
                        owner = %owner,
                        sleep_ms = sleep.as_millis() as u64,
                        "Lock held; waiting"
                    );
                    tokio::time::sleep(sleep).await;
                    backoff = (backoff * 2).min(LOCK_POLL_MAX);
                }
                other => return other,
            }
        }
    }

    /// Take a lease wrapped in a guard that releases it when dropped.
    ///
    /// # Errors
    ///
    /// Same as [`acquire_lock_within`](Self::acquire_lock_within).
    pub async fn lock_guard(
        &self,
        fingerprint: &Fingerprint,
        holder: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockGuard> {
        let token = self
            .acquire_lock_within(fingerprint, holder, ttl, wait)
            .await?;
        Ok(LockGuard::new(self.clone(), token))
    }

    /// Release a lease.
    ///
    /// Returns `false` if the lease had already expired and been taken over
    /// or removed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn release_lock(&self, token: &LockToken) -> Result<bool> {
        let Some((bytes, lease)) = self.load_lock(token.fingerprint()).await? else {
            return Ok(false);
        };
        if !token.matches(&lease) {
            return Ok(false);
        }
        let outcome = self
            .bounded(
                "release lock",
                self.store.compare_and_swap(
                    Keyspace::Locks,
                    token.fingerprint().as_bytes(),
                    Some(bytes.as_slice()),
                    None,
                ),
            )
            .await?;
        let released = outcome.is_swapped();
        debug!(
            fingerprint = %token.fingerprint().short(),
            released,
            "Lock released"
        );
        Ok(released)
    }

    /// Delete every expired lease. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn purge_expired_locks(&self) -> Result<usize> {
        let keys = self
            .bounded("list locks", self.store.keys(Keyspace::Locks))
            .await?;
        let now = Utc::now();
        let mut purged = 0;

        for key in keys {
            let Some(bytes) = self
                .bounded("get lock", self.store.get(Keyspace::Locks, &key))
                .await?
            else {
                continue;
            };
            let expired = match LockRecord::from_bytes(&bytes) {
                Ok(lease) => lease.is_expired_at(now),
                Err(e) => {
                    warn!(error = %e, "Removing undecodable lease");
                    true
                }
            };
            if !expired {
                continue;
            }
            let outcome = self
                .bounded(
                    "purge lock",
                    self.store
                        .compare_and_swap(Keyspace::Locks, &key, Some(bytes.as_slice()), None),
                )
                .await?;
            if outcome.is_swapped() {
                purged += 1;
            }
        }

        if purged > 0 {
            debug!(purged, "Expired locks purged");
        }
        Ok(purged)
    }

    /// Flush the store to durable storage.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` on store failure or timeout.
    pub async fn flush(&self) -> Result<()> {
        self.bounded("flush", self.store.flush()).await
    }
}
