//! Concurrency tests for the identity ledger.
//!
//! These run on a multi-threaded runtime so contending tasks genuinely
//! interleave.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use genesis_identity::{
    BiometricBundle, BiometricChannel, BiometricDigest, Fingerprint, IdentityRecord, IdentityStatus,
};
use genesis_ledger::{
    CasOutcome, IdentityLedger, InMemoryStore, Keyspace, LeaseCheck, LedgerError, LedgerStore,
};
use tokio::task::JoinSet;

fn fingerprint(seed: u8) -> Fingerprint {
    Fingerprint::from_bytes(&[seed; 64]).unwrap()
}

fn record(seed: u8, variant: u8) -> IdentityRecord {
    let bundle = BiometricBundle::new()
        .with(
            BiometricChannel::Fingerprint,
            BiometricDigest::new(vec![variant; 32]).unwrap(),
        )
        .with(BiometricChannel::Iris, BiometricDigest::new(vec![seed; 32]).unwrap())
        .with(BiometricChannel::Voice, BiometricDigest::new(vec![seed; 32]).unwrap());
    IdentityRecord::new(
        fingerprint(seed),
        bundle,
        vec![1, 2, 3],
        IdentityStatus::Active,
        Utc::now(),
    )
}

/// In-memory store whose record writes stall before reaching the map.
struct DelayedStore {
    inner: InMemoryStore,
    delay: Duration,
}

#[async_trait]
impl LedgerStore for DelayedStore {
    async fn get(&self, space: Keyspace, key: &[u8]) -> genesis_ledger::Result<Option<Vec<u8>>> {
        self.inner.get(space, key).await
    }

    async fn insert_if_absent(
        &self,
        space: Keyspace,
        key: &[u8],
        value: Vec<u8>,
    ) -> genesis_ledger::Result<Option<Vec<u8>>> {
        self.inner.insert_if_absent(space, key, value).await
    }

    async fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> genesis_ledger::Result<CasOutcome> {
        self.inner.compare_and_swap(space, key, expected, new).await
    }

    async fn insert_record_if_absent(
        &self,
        key: &[u8],
        value: Vec<u8>,
        lease: LeaseCheck<'_>,
    ) -> genesis_ledger::Result<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_record_if_absent(key, value, lease).await
    }

    async fn compare_and_swap_record(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        lease: LeaseCheck<'_>,
    ) -> genesis_ledger::Result<CasOutcome> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .compare_and_swap_record(key, expected, new, lease)
            .await
    }

    async fn keys(&self, space: Keyspace) -> genesis_ledger::Result<Vec<Vec<u8>>> {
        self.inner.keys(space).await
    }

    fn len(&self, space: Keyspace) -> usize {
        self.inner.len(space)
    }

    async fn flush(&self) -> genesis_ledger::Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "delayed"
    }
}

fn delayed_ledger(delay: Duration) -> IdentityLedger {
    IdentityLedger::new(Arc::new(DelayedStore {
        inner: InMemoryStore::new(),
        delay,
    }))
}

async fn race_registrations(store: Arc<dyn LedgerStore>, contenders: u8) {
    let ledger = IdentityLedger::new(store);
    let mut tasks = JoinSet::new();

    for variant in 0..contenders {
        let ledger = ledger.clone();
        tasks.spawn(async move { ledger.register_if_absent(record(42, variant), None).await });
    }

    let mut winners = Vec::new();
    let mut rejected = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(rec) => winners.push(rec),
            Err(LedgerError::AlreadyRegistered { status }) => {
                assert_eq!(status, IdentityStatus::Active);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one registration must win");
    assert_eq!(rejected, contenders as usize - 1);

    let stored = ledger.lookup(&fingerprint(42)).await.unwrap().unwrap();
    assert_eq!(stored.biometric_bundle, winners[0].biometric_bundle);
    assert_eq!(ledger.record_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_register_single_winner_in_memory() {
    race_registrations(Arc::new(InMemoryStore::new()), 64).await;
}

#[cfg(feature = "sled-storage")]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_register_single_winner_sled() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = genesis_ledger::SledStore::open(dir.path(), 16).unwrap();
    race_registrations(Arc::new(store), 32).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_lock_single_holder() {
    let ledger = IdentityLedger::new(Arc::new(InMemoryStore::new()));
    let mut tasks = JoinSet::new();

    for i in 0..32 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            ledger
                .acquire_lock(&fingerprint(7), &format!("holder-{i}"), Duration::from_secs(5))
                .await
        });
    }

    let mut holders = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => holders += 1,
            Err(LedgerError::AlreadyLocked { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(holders, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_freeze_applies_once() {
    let ledger = IdentityLedger::new(Arc::new(InMemoryStore::new()));
    ledger.register_if_absent(record(9, 0), None).await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            ledger
                .transition_status(&fingerprint(9), IdentityStatus::Frozen, None)
                .await
        });
    }

    let mut applied = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(rec) => {
                assert_eq!(rec.status, IdentityStatus::Frozen);
                applied += 1;
            }
            Err(LedgerError::InvalidTransition { from, .. }) => {
                assert_eq!(from, IdentityStatus::Frozen);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_fingerprints_register_in_parallel() {
    let ledger = IdentityLedger::new(Arc::new(InMemoryStore::new()));
    let mut tasks = JoinSet::new();

    for seed in 0..50u8 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            let token = ledger
                .acquire_lock(&fingerprint(seed), "registrar", Duration::from_secs(5))
                .await?;
            let result = ledger.register_if_absent(record(seed, 0), Some(&token)).await;
            ledger.release_lock(&token).await?;
            result
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }
    assert_eq!(ledger.record_count(), 50);
    assert_eq!(ledger.lock_count(), 0);
}

#[cfg(feature = "sled-storage")]
#[tokio::test]
async fn sled_ledger_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = genesis_ledger::SledStore::open(dir.path(), 16).unwrap();
        let ledger = IdentityLedger::new(Arc::new(store));
        ledger.register_if_absent(record(3, 0), None).await.unwrap();
        ledger
            .transition_status(&fingerprint(3), IdentityStatus::Frozen, None)
            .await
            .unwrap();
        ledger.flush().await.unwrap();
    }

    let store = genesis_ledger::SledStore::open(dir.path(), 16).unwrap();
    let ledger = IdentityLedger::new(Arc::new(store));
    let rec = ledger.lookup(&fingerprint(3)).await.unwrap().unwrap();
    assert_eq!(rec.status, IdentityStatus::Frozen);
    assert!(matches!(
        ledger.register_if_absent(record(3, 1), None).await,
        Err(LedgerError::AlreadyRegistered {
            status: IdentityStatus::Frozen
        })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unlocked_register_refused_when_lease_taken_mid_write() {
    let ledger = delayed_ledger(Duration::from_millis(200));

    let register = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.register_if_absent(record(5, 0), None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let token = ledger
        .acquire_lock(&fingerprint(5), "holder-a", Duration::from_secs(5))
        .await
        .unwrap();

    let outcome = register.await.unwrap();
    assert!(
        matches!(&outcome, Err(LedgerError::AlreadyLocked { holder, .. }) if holder == "holder-a"),
        "write under a foreign lease must be refused, got {outcome:?}"
    );
    assert_eq!(ledger.record_count(), 0);

    // The holder itself can still write.
    ledger
        .register_if_absent(record(5, 0), Some(&token))
        .await
        .unwrap();
    assert!(ledger.release_lock(&token).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unlocked_transition_refused_when_lease_taken_mid_write() {
    let ledger = delayed_ledger(Duration::from_millis(200));
    ledger.register_if_absent(record(6, 0), None).await.unwrap();

    let freeze = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .transition_status(&fingerprint(6), IdentityStatus::Frozen, None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _token = ledger
        .acquire_lock(&fingerprint(6), "holder-a", Duration::from_secs(5))
        .await
        .unwrap();

    assert!(matches!(
        freeze.await.unwrap(),
        Err(LedgerError::AlreadyLocked { .. })
    ));
    let stored = ledger.lookup(&fingerprint(6)).await.unwrap().unwrap();
    assert_eq!(stored.status, IdentityStatus::Active);
}
