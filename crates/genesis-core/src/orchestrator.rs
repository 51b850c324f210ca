//! Registration and verification orchestration.
//!
//! [`Orchestrator`] composes the share codec, the fuser, the ledger and the
//! risk scorer:
//!
//! - **register**: shares → reconstruct → salt → fuse → lock →
//!   `register_if_absent` → release
//! - **verify**: shares → reconstruct → salt → fuse → lookup → session →
//!   score
//!
//! Transient ledger failures are retried with exponential backoff; every
//! other failure is returned as-is. A registration writes one record, built
//! before the first attempt and tagged with a fresh registration id, so a
//! retry after a lost reply recognizes its own write.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use genesis_cap::{RiskScorer, SessionRiskState};
use genesis_crypto::{reconstruct, CryptoError, SecretShare};
use genesis_identity::{
    derive_salt, BiometricBundle, BiometricFuser, Fingerprint, IdentityRecord, IdentityStatus,
};
use genesis_ledger::{
    IdentityLedger, InMemoryStore, LedgerError, LedgerStore, LockGuard, LockToken, SledStore,
};
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::config::GenesisConfig;
use crate::events::{EventBus, GenesisEvent, SessionEndReason};
use crate::request::{
    RegistrationRequest, RegistrationResponse, VerificationRequest, VerificationResponse,
};
use crate::session::SessionRegistry;
use crate::{CoreError, Result};

/// Size of a registration id in bytes.
const REGISTRATION_ID_SIZE: usize = 16;

fn registration_id() -> String {
    let mut id = [0u8; REGISTRATION_ID_SIZE];
    rand::thread_rng().fill_bytes(&mut id);
    hex::encode(id)
}

/// Lease held by an in-flight registration, readable by whoever cancels it.
#[derive(Default)]
struct HeldLease(Mutex<Option<LockToken>>);

impl HeldLease {
    fn set(&self, token: Option<LockToken>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn take(&self) -> Option<LockToken> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Entry point for registration and verification.
///
/// Cheap to clone; clones share the ledger, sessions and event channel.
#[derive(Clone, Debug)]
pub struct Orchestrator {
    config: Arc<GenesisConfig>,
    ledger: IdentityLedger,
    fuser: BiometricFuser,
    scorer: RiskScorer,
    sessions: Arc<SessionRegistry>,
    events: EventBus,
    holder: Arc<str>,
}

impl Orchestrator {
    /// Create an orchestrator over an existing ledger.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: GenesisConfig, ledger: IdentityLedger) -> Result<Self> {
        config.validate()?;
        let scorer = config.scorer()?;
        let sessions = SessionRegistry::new(config.session_policy, config.session_idle_timeout());

        let mut tag = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut tag);

        Ok(Self {
            fuser: config.fuser(),
            scorer,
            sessions: Arc::new(sessions),
            events: EventBus::new(config.event_buffer),
            holder: Arc::from(format!("orchestrator-{}", hex::encode(tag))),
            config: Arc::new(config),
            ledger,
        })
    }

    /// Create an orchestrator and the ledger its configuration describes.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid, or `Ledger` if the
    /// sled database cannot be opened.
    pub fn open(config: GenesisConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn LedgerStore> = if config.storage.in_memory {
            Arc::new(InMemoryStore::new())
        } else {
            Arc::new(SledStore::open(
                &config.storage.data_dir,
                config.storage.cache_mb,
            )?)
        };
        info!(
            backend = store.backend_name(),
            data_dir = %config.storage.data_dir.display(),
            "Opening identity ledger"
        );
        let ledger = IdentityLedger::with_config(store, config.ledger_config());
        Self::new(config, ledger)
    }

    /// Orchestrator over a fresh in-memory ledger with default settings.
    ///
    /// # Errors
    ///
    /// Never fails with the default configuration; the signature matches
    /// [`open`](Self::open).
    pub fn in_memory() -> Result<Self> {
        Self::open(GenesisConfig::in_memory())
    }

    /// Active configuration.
    pub fn config(&self) -> &GenesisConfig {
        &self.config
    }

    /// The ledger.
    pub fn ledger(&self) -> &IdentityLedger {
        &self.ledger
    }

    /// Live sessions.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The event channel.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_receiver(&self) -> Option<tokio::sync::mpsc::Receiver<GenesisEvent>> {
        self.events.take_receiver()
    }

    /// Lock holder name used by this orchestrator.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    // ===== Registration =====

    /// Bind the identity described by `request` to a new ledger record.
    ///
    /// # Errors
    ///
    /// - `MismatchedShares` if the shares disagree with the configured split
    /// - `InsufficientShares` / `CorruptShare` from reconstruction
    /// - `InsufficientLayers` from fusion
    /// - `AlreadyRegistered` if the fingerprint is taken, whatever its status
    /// - `LedgerUnavailable` / `LockTimeout` once retries are exhausted
    ///
    /// Nothing is written to the ledger unless every input check passes.
    pub async fn register(&self, request: RegistrationRequest) -> Result<RegistrationResponse> {
        let fingerprint = self.derive_fingerprint(&request.biometric_bundle, &request.shards)?;
        self.register_fingerprint(fingerprint, &request, &HeldLease::default())
            .await
    }

    /// [`register`](Self::register) bounded by `timeout`.
    ///
    /// Input checks run before the clock starts. If the deadline elapses
    /// while this orchestrator holds the fingerprint's lease, the lease is
    /// released before `Timeout` is returned.
    ///
    /// # Errors
    ///
    /// `Timeout` if the deadline elapses, otherwise as `register`.
    pub async fn register_with_timeout(
        &self,
        request: RegistrationRequest,
        timeout: Duration,
    ) -> Result<RegistrationResponse> {
        let fingerprint = self.derive_fingerprint(&request.biometric_bundle, &request.shards)?;
        let held = HeldLease::default();
        let attempt = self.register_fingerprint(fingerprint.clone(), &request, &held);

        match tokio::time::timeout(timeout, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Some(token) = held.take() {
                    match self.ledger.release_lock(&token).await {
                        Ok(released) => debug!(
                            fingerprint = %fingerprint.short(),
                            released,
                            "Lease of timed-out registration released"
                        ),
                        Err(e) => warn!(
                            fingerprint = %fingerprint.short(),
                            error = %e,
                            "Lease release after timeout failed; lease will expire"
                        ),
                    }
                }
                let elapsed_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(fingerprint = %fingerprint.short(), elapsed_ms, "Registration timed out");
                Err(CoreError::Timeout { elapsed_ms })
            }
        }
    }

    async fn register_fingerprint(
        &self,
        fingerprint: Fingerprint,
        request: &RegistrationRequest,
        held: &HeldLease,
    ) -> Result<RegistrationResponse> {
        let status = if self.config.activate_immediately {
            IdentityStatus::Active
        } else {
            IdentityStatus::PendingVerification
        };
        let indices: Vec<u8> = request.shards.iter().map(|s| s.index).collect();
        let record = IdentityRecord::new(
            fingerprint.clone(),
            request.biometric_bundle.clone(),
            indices,
            status,
            Utc::now(),
        )
        .with_registration_id(registration_id());

        let pending = &record;
        let outcome = self
            .with_retry("register", move || self.register_once(pending, held))
            .await;

        match outcome {
            Ok(record) => {
                info!(
                    fingerprint = %fingerprint.short(),
                    status = %record.status,
                    shards = record.shard_indices.len(),
                    "Registration accepted"
                );
                self.events.emit(GenesisEvent::Registered {
                    fingerprint: fingerprint.clone(),
                    status: record.status,
                });
                Ok(RegistrationResponse {
                    fingerprint,
                    status: record.status,
                    registered_at: record.registered_at,
                })
            }
            Err(e) => {
                info!(
                    fingerprint = %fingerprint.short(),
                    error = %e,
                    "Registration rejected"
                );
                Err(e)
            }
        }
    }

    async fn register_once(
        &self,
        record: &IdentityRecord,
        held: &HeldLease,
    ) -> Result<IdentityRecord> {
        let guard = self.lock(&record.fingerprint).await?;
        held.set(Some(guard.token().clone()));
        let outcome = self
            .ledger
            .register_if_absent(record.clone(), Some(guard.token()))
            .await;
        self.release(guard).await;
        held.set(None);
        Ok(outcome?)
    }

    // ===== Verification =====

    /// Authenticate a request and score its session signals.
    ///
    /// # Errors
    ///
    /// - input errors as for [`register`](Self::register), plus `InvalidInput`
    ///   for impossible signal values
    /// - `UnknownIdentity` if no record matches
    /// - `IdentityFrozen` if the record is frozen
    /// - `SessionRejected` if another session holds the identity under the
    ///   `reject` policy
    pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationResponse> {
        let batch = request.signal_batch();
        batch.validate()?;
        let fingerprint = self.derive_fingerprint(&request.biometric_bundle, &request.shards)?;

        let Some(record) = self.lookup(&fingerprint).await? else {
            info!(fingerprint = %fingerprint.short(), "Verification failed: unknown identity");
            return Err(CoreError::UnknownIdentity(fingerprint.short()));
        };
        if record.status == IdentityStatus::Frozen {
            info!(fingerprint = %fingerprint.short(), "Verification failed: identity frozen");
            return Err(CoreError::IdentityFrozen(fingerprint.short()));
        }

        let evaluation = self
            .sessions
            .evaluate(
                request.session_id.as_deref(),
                &fingerprint,
                &batch,
                &self.scorer,
            )?;
        let state = evaluation.state.clone();

        if evaluation.escalated() {
            info!(
                fingerprint = %fingerprint.short(),
                session_id = %state.session_id,
                from = %evaluation.previous_tier,
                to = %state.tier,
                risk_score = state.risk_score,
                "Session risk escalated"
            );
            self.events.emit(GenesisEvent::RiskEscalated {
                session_id: state.session_id.clone(),
                fingerprint: fingerprint.clone(),
                from: evaluation.previous_tier,
                to: state.tier,
                risk_score: state.risk_score,
            });
        }

        let mut status = record.status;
        if let Some(limit) = self.config.freeze_threshold {
            if state.risk_score >= limit && status == IdentityStatus::Active {
                warn!(
                    fingerprint = %fingerprint.short(),
                    risk_score = state.risk_score,
                    limit,
                    "Risk reached freeze threshold; freezing identity"
                );
                status = match self.freeze(&fingerprint).await {
                    Ok(frozen) => frozen.status,
                    // A concurrent caller froze it first.
                    Err(CoreError::Ledger(LedgerError::InvalidTransition {
                        from: IdentityStatus::Frozen,
                        ..
                    })) => IdentityStatus::Frozen,
                    Err(e) => return Err(e),
                };
            }
        }

        info!(
            fingerprint = %fingerprint.short(),
            session_id = %state.session_id,
            tier = %state.tier,
            risk_score = state.risk_score,
            "Session verified"
        );

        Ok(VerificationResponse {
            action: state.action(),
            session_id: state.session_id,
            tier: state.tier,
            status,
            risk_score: state.risk_score,
        })
    }

    /// End a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no such session is live.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionRiskState> {
        let state = self
            .sessions
            .end(session_id)
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;
        debug!(session_id, fingerprint = %state.fingerprint.short(), "Session ended");
        self.events.emit(GenesisEvent::SessionEnded {
            session_id: state.session_id.clone(),
            fingerprint: state.fingerprint.clone(),
            reason: SessionEndReason::Closed,
        });
        Ok(state)
    }

    /// Current state of a live session.
    pub fn session(&self, session_id: &str) -> Option<SessionRiskState> {
        self.sessions.get(session_id)
    }

    // ===== Lifecycle =====

    /// Freeze an identity and end its sessions. The fingerprint stays claimed.
    ///
    /// # Errors
    ///
    /// - `UnknownIdentity` if no record exists
    /// - `InvalidTransition` unless the identity is `ACTIVE`
    pub async fn freeze(&self, fingerprint: &Fingerprint) -> Result<IdentityRecord> {
        let record = self.transition(fingerprint, IdentityStatus::Frozen).await?;
        for state in self.sessions.end_for(fingerprint) {
            self.events.emit(GenesisEvent::SessionEnded {
                session_id: state.session_id,
                fingerprint: fingerprint.clone(),
                reason: SessionEndReason::IdentityFrozen,
            });
        }
        Ok(record)
    }

    /// Complete a `PENDING_VERIFICATION` identity.
    ///
    /// # Errors
    ///
    /// - `UnknownIdentity` if no record exists
    /// - `InvalidTransition` unless the identity is `PENDING_VERIFICATION`
    pub async fn activate(&self, fingerprint: &Fingerprint) -> Result<IdentityRecord> {
        self.transition(fingerprint, IdentityStatus::Active).await
    }

    async fn transition(
        &self,
        fingerprint: &Fingerprint,
        to: IdentityStatus,
    ) -> Result<IdentityRecord> {
        let record = self
            .with_retry("transition", move || self.transition_once(fingerprint, to))
            .await?;

        // Each status has exactly one legal predecessor.
        let from = match to {
            IdentityStatus::Frozen => IdentityStatus::Active,
            _ => IdentityStatus::PendingVerification,
        };
        info!(
            fingerprint = %fingerprint.short(),
            from = %from,
            to = %to,
            "Identity status changed"
        );
        self.events.emit(GenesisEvent::StatusChanged {
            fingerprint: fingerprint.clone(),
            from,
            to,
        });
        Ok(record)
    }

    async fn transition_once(
        &self,
        fingerprint: &Fingerprint,
        to: IdentityStatus,
    ) -> Result<IdentityRecord> {
        let guard = self.lock(fingerprint).await?;
        let outcome = self
            .ledger
            .transition_status(fingerprint, to, Some(guard.token()))
            .await;
        self.release(guard).await;
        match outcome {
            Err(LedgerError::NotFound(_)) => Err(CoreError::UnknownIdentity(fingerprint.short())),
            other => Ok(other?),
        }
    }

    // ===== Queries =====

    /// Read a record.
    ///
    /// # Errors
    ///
    /// `LedgerUnavailable` once retries are exhausted.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<IdentityRecord>> {
        self.with_retry("lookup", move || self.ledger.lookup(fingerprint))
            .await
    }

    /// Fingerprint the presented credentials would register under.
    ///
    /// Pure: touches neither the ledger nor the sessions.
    ///
    /// # Errors
    ///
    /// Input errors as for [`register`](Self::register).
    pub fn derive_fingerprint(
        &self,
        bundle: &BiometricBundle,
        shards: &[SecretShare],
    ) -> Result<Fingerprint> {
        self.check_shares(shards)?;
        let secret = reconstruct(shards)?;
        let salt = derive_salt(&secret);
        Ok(self.fuser.fuse(bundle, salt.as_bytes())?)
    }

    fn check_shares(&self, shards: &[SecretShare]) -> Result<()> {
        if shards.is_empty() {
            return Err(CryptoError::InsufficientShares {
                required: usize::from(self.config.shard_threshold),
                provided: 0,
            }
            .into());
        }
        let (total, threshold) = (self.config.total_shards, self.config.shard_threshold);
        if let Some(odd) = shards
            .iter()
            .find(|s| s.total_shares != total || s.threshold != threshold)
        {
            return Err(CryptoError::MismatchedShares(format!(
                "share {} is {}-of-{}, expected {}-of-{}",
                odd.index, odd.threshold, odd.total_shares, threshold, total
            ))
            .into());
        }
        Ok(())
    }

    // ===== Plumbing =====

    async fn lock(&self, fingerprint: &Fingerprint) -> Result<LockGuard> {
        Ok(self
            .ledger
            .lock_guard(
                fingerprint,
                &self.holder,
                self.config.lock_ttl,
                self.config.lock_wait,
            )
            .await?)
    }

    async fn release(&self, guard: LockGuard) {
        let fingerprint = guard.token().fingerprint().short();
        match guard.release().await {
            Ok(true) => {}
            Ok(false) => warn!(fingerprint = %fingerprint, "Lock lapsed before release"),
            Err(e) => warn!(
                fingerprint = %fingerprint,
                error = %e,
                "Lock release failed; lease will expire"
            ),
        }
    }

    async fn with_retry<T, E, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<CoreError>,
    {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            let err: CoreError = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= retry.max_attempts {
                warn!(op, attempts = attempt, error = %err, "Giving up after transient failures");
                return Err(err);
            }
            let backoff = retry.backoff_for(attempt);
            debug!(
                op,
                attempt,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Transient failure; retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisConfigBuilder;
    use crate::session::SessionPolicy;
    use crate::ErrorKind;
    use genesis_cap::{RiskTier, SessionSignal};
    use genesis_crypto::split;
    use genesis_identity::{BiometricChannel, BiometricDigest};

    const SECRET: &[u8] = b"NID-7741-0192-5530";

    fn bundle(seed: u8) -> BiometricBundle {
        BiometricBundle::new()
            .with(
                BiometricChannel::Fingerprint,
                BiometricDigest::new(vec![seed; 32]).unwrap(),
            )
            .with(BiometricChannel::Iris, BiometricDigest::new(vec![seed ^ 0x5a; 32]).unwrap())
            .with(BiometricChannel::Face, BiometricDigest::new(vec![seed ^ 0xa5; 32]).unwrap())
    }

    fn orchestrator(builder: GenesisConfigBuilder) -> Orchestrator {
        Orchestrator::open(builder.with_in_memory_storage().build()).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let shares = split(SECRET, 5, 3).unwrap();

        let registered = orch
            .register(RegistrationRequest::new(bundle(1), shares[..3].to_vec()))
            .await
            .unwrap();
        assert_eq!(registered.status, IdentityStatus::Active);

        // A different 3-subset yields the same fingerprint.
        let verified = orch
            .verify(VerificationRequest::new(bundle(1), shares[2..].to_vec()))
            .await
            .unwrap();
        assert_eq!(verified.status, IdentityStatus::Active);
        assert_eq!(verified.tier, RiskTier::Low);

        let record = orch.lookup(&registered.fingerprint).await.unwrap().unwrap();
        assert_eq!(record.shard_indices, vec![1, 2, 3]);
        assert!(record.lock_state.is_none());
    }

    #[tokio::test]
    async fn test_share_parameters_must_match_config() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let shares = split(SECRET, 4, 3).unwrap();
        let err = orch
            .register(RegistrationRequest::new(bundle(1), shares))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedShares);
        assert_eq!(orch.ledger().record_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_shares() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let err = orch
            .register(RegistrationRequest::new(bundle(1), Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::Crypto(CryptoError::InsufficientShares {
                required: 3,
                provided: 0
            })
        );
    }

    #[tokio::test]
    async fn test_insufficient_layers_writes_nothing() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let shares = split(SECRET, 5, 3).unwrap();
        let thin = BiometricBundle::new()
            .with(BiometricChannel::Voice, BiometricDigest::new(vec![1u8; 8]).unwrap());
        let err = orch
            .register(RegistrationRequest::new(thin, shares))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientLayers);
        assert_eq!(orch.ledger().record_count(), 0);
        assert_eq!(orch.ledger().lock_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_then_activate() {
        let orch = orchestrator(GenesisConfigBuilder::new().with_activate_immediately(false));
        let mut events = orch.take_event_receiver().unwrap();
        let shares = split(SECRET, 5, 3).unwrap();

        let registered = orch
            .register(RegistrationRequest::new(bundle(2), shares))
            .await
            .unwrap();
        assert_eq!(registered.status, IdentityStatus::PendingVerification);

        let activated = orch.activate(&registered.fingerprint).await.unwrap();
        assert_eq!(activated.status, IdentityStatus::Active);

        let err = orch.activate(&registered.fingerprint).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        assert!(matches!(
            events.recv().await.unwrap(),
            GenesisEvent::Registered {
                status: IdentityStatus::PendingVerification,
                ..
            }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            GenesisEvent::StatusChanged {
                from: IdentityStatus::PendingVerification,
                to: IdentityStatus::Active,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_freeze_unknown_identity() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let fp = Fingerprint::from_bytes(&[4u8; 64]).unwrap();
        let err = orch.freeze(&fp).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownIdentity);
        assert_eq!(orch.ledger().lock_count(), 0);
    }

    #[tokio::test]
    async fn test_freeze_threshold_freezes_identity() {
        let orch = orchestrator(GenesisConfigBuilder::new().with_freeze_threshold(8.0));
        let shares = split(SECRET, 5, 3).unwrap();
        let registered = orch
            .register(RegistrationRequest::new(bundle(3), shares.clone()))
            .await
            .unwrap();

        let resp = orch
            .verify(
                VerificationRequest::new(bundle(3), shares.clone()).with_signals(vec![
                    SessionSignal::GeolocationJump { distance_km: 900.0 },
                    SessionSignal::FailedChallenge,
                ]),
            )
            .await
            .unwrap();
        assert_eq!(resp.tier, RiskTier::High);
        assert_eq!(resp.status, IdentityStatus::Frozen);
        assert!(orch.session(&resp.session_id).is_none());

        let err = orch
            .verify(VerificationRequest::new(bundle(3), shares))
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::IdentityFrozen(registered.fingerprint.short()));
    }

    #[tokio::test]
    async fn test_end_session() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let shares = split(SECRET, 5, 3).unwrap();
        orch.register(RegistrationRequest::new(bundle(5), shares.clone()))
            .await
            .unwrap();
        let resp = orch
            .verify(VerificationRequest::new(bundle(5), shares).with_session("desk-1"))
            .await
            .unwrap();
        assert_eq!(resp.session_id, "desk-1");

        let ended = orch.end_session("desk-1").await.unwrap();
        assert_eq!(ended.session_id, "desk-1");
        assert_eq!(
            orch.end_session("desk-1").await.unwrap_err().kind(),
            ErrorKind::SessionNotFound
        );
    }

    #[tokio::test]
    async fn test_reject_policy() {
        let orch = orchestrator(GenesisConfigBuilder::new().with_session_policy(SessionPolicy::Reject));
        let shares = split(SECRET, 5, 3).unwrap();
        orch.register(RegistrationRequest::new(bundle(6), shares.clone()))
            .await
            .unwrap();
        orch.verify(VerificationRequest::new(bundle(6), shares.clone()).with_session("a"))
            .await
            .unwrap();
        let err = orch
            .verify(VerificationRequest::new(bundle(6), shares).with_session("b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionRejected);
    }

    #[tokio::test]
    async fn test_invalid_signal_rejected_before_lookup() {
        let orch = orchestrator(GenesisConfigBuilder::new());
        let shares = split(SECRET, 5, 3).unwrap();
        let err = orch
            .verify(
                VerificationRequest::new(bundle(7), shares)
                    .with_signals(vec![SessionSignal::BehavioralDeviation { deviation: 2.0 }]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_register_with_timeout_while_locked_elsewhere() {
        let orch = orchestrator(
            GenesisConfigBuilder::new()
                .with_lock_wait(Duration::from_secs(5))
                .with_retry(1, Duration::from_millis(10)),
        );
        let shares = split(SECRET, 5, 3).unwrap();
        let fp = orch.derive_fingerprint(&bundle(8), &shares).unwrap();
        let other = orch
            .ledger()
            .acquire_lock(&fp, "other-node", Duration::from_secs(30))
            .await
            .unwrap();

        let err = orch
            .register_with_timeout(
                RegistrationRequest::new(bundle(8), shares),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::Timeout { elapsed_ms: 50 });
        assert!(err.is_retryable());
        assert_eq!(orch.ledger().record_count(), 0);

        // The other holder's lease is untouched.
        let state = orch.ledger().lock_state(&fp).await.unwrap().unwrap();
        assert_eq!(state.holder, "other-node");
        assert!(orch.ledger().release_lock(&other).await.unwrap());
    }
}
