//! Store abstraction for ledger data.
//!
//! The [`LedgerStore`] trait is a byte-oriented key-value interface over two
//! keyspaces with the conditional-write primitives the ledger's guarantees
//! are built on. Backends must make `insert_if_absent` and
//! `compare_and_swap` linearizable per key.
//!
//! Record writes go through `insert_record_if_absent` and
//! `compare_and_swap_record`, which read the lease stored under the same key
//! and apply the write in one atomic step. A lease taken concurrently is
//! either seen by the check or taken after the write lands.
//!
//! ## Implementations
//!
//! - [`InMemoryStore`]: sharded `DashMap`s; per-key atomicity without a
//!   global lock
//! - [`SledStore`](crate::SledStore): persistent sled trees
//!
//! ## Example
//!
//! ```
//! use genesis_ledger::storage::{InMemoryStore, Keyspace, LedgerStore};
//!
//! let store = InMemoryStore::new();
//! assert_eq!(store.len(Keyspace::Records), 0);
//! ```

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::Result;

/// Gate run against the lease bytes under a record's key before a record
/// write. Returning an error aborts the write.
pub type LeaseCheck<'a> = &'a (dyn Fn(Option<&[u8]>) -> Result<()> + Send + Sync);

/// Logical partition of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// Identity records keyed by fingerprint bytes.
    Records,
    /// Per-fingerprint leases keyed by fingerprint bytes.
    Locks,
}

impl Keyspace {
    /// Name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyspace::Records => "records",
            Keyspace::Locks => "locks",
        }
    }
}

/// Result of a compare-and-swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected value matched and the new value was written.
    Swapped,
    /// The expected value did not match; carries the current value.
    Conflict(Option<Vec<u8>>),
}

impl CasOutcome {
    /// Whether the swap took effect.
    pub fn is_swapped(&self) -> bool {
        matches!(self, CasOutcome::Swapped)
    }
}

/// Key-value store with conditional writes.
///
/// ## Async
///
/// All I/O methods are async so callers can bound them with a timeout.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read a value.
    async fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert `value` only if `key` is absent.
    ///
    /// Returns `None` when the value was written, or the existing value when
    /// the key was already present.
    async fn insert_if_absent(
        &self,
        space: Keyspace,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<Option<Vec<u8>>>;

    /// Replace the value at `key` if it currently equals `expected`.
    ///
    /// `expected = None` means "key absent"; `new = None` deletes the key.
    async fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<CasOutcome>;

    /// Insert a record only if `key` is absent and `lease` accepts the lease
    /// stored under the same key.
    ///
    /// The lease read and the record write are one atomic step. Returns as
    /// [`insert_if_absent`](Self::insert_if_absent), or the error from
    /// `lease`.
    async fn insert_record_if_absent(
        &self,
        key: &[u8],
        value: Vec<u8>,
        lease: LeaseCheck<'_>,
    ) -> Result<Option<Vec<u8>>>;

    /// Compare-and-swap a record, gated on `lease` like
    /// [`insert_record_if_absent`](Self::insert_record_if_absent).
    async fn compare_and_swap_record(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        lease: LeaseCheck<'_>,
    ) -> Result<CasOutcome>;

    /// List all keys in a keyspace.
    async fn keys(&self, space: Keyspace) -> Result<Vec<Vec<u8>>>;

    /// Number of entries in a keyspace.
    fn len(&self, space: Keyspace) -> usize;

    /// Whether a keyspace is empty.
    fn is_empty(&self, space: Keyspace) -> bool {
        self.len(space) == 0
    }

    /// Flush pending writes to durable storage.
    ///
    /// For in-memory backends, this is a no-op.
    async fn flush(&self) -> Result<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// In-memory store for tests and single-process deployments.
///
/// Each keyspace is a `DashMap`, so operations on different fingerprints
/// land on different shards and never contend on one lock.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<Vec<u8>, Vec<u8>>,
    locks: DashMap<Vec<u8>, Vec<u8>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("records", &self.records.len())
            .field("locks", &self.locks.len())
            .finish()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn space(&self, space: Keyspace) -> &DashMap<Vec<u8>, Vec<u8>> {
        match space {
            Keyspace::Records => &self.records,
            Keyspace::Locks => &self.locks,
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.space(space).get(key).map(|v| v.value().clone()))
    }

    async fn insert_if_absent(
        &self,
        space: Keyspace,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        match self.space(space).entry(key.to_vec()) {
            Entry::Occupied(existing) => Ok(Some(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(None)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<CasOutcome> {
        Ok(swap_entry(self.space(space).entry(key.to_vec()), expected, new))
    }

    async fn insert_record_if_absent(
        &self,
        key: &[u8],
        value: Vec<u8>,
        lease: LeaseCheck<'_>,
    ) -> Result<Option<Vec<u8>>> {
        // Locks shard first, then records shard; nothing else holds both.
        let held = self.locks.entry(key.to_vec());
        lease(entry_value(&held))?;
        let outcome = match self.records.entry(key.to_vec()) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(value);
                None
            }
        };
        drop(held);
        Ok(outcome)
    }

    async fn compare_and_swap_record(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        lease: LeaseCheck<'_>,
    ) -> Result<CasOutcome> {
        let held = self.locks.entry(key.to_vec());
        lease(entry_value(&held))?;
        let outcome = swap_entry(self.records.entry(key.to_vec()), expected, new);
        drop(held);
        Ok(outcome)
    }

    async fn keys(&self, space: Keyspace) -> Result<Vec<Vec<u8>>> {
        Ok(self.space(space).iter().map(|e| e.key().clone()).collect())
    }

    fn len(&self, space: Keyspace) -> usize {
        self.space(space).len()
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn entry_value<'e>(entry: &'e Entry<'_, Vec<u8>, Vec<u8>>) -> Option<&'e [u8]> {
    match entry {
        Entry::Occupied(current) => Some(current.get().as_slice()),
        Entry::Vacant(_) => None,
    }
}

fn swap_entry(
    entry: Entry<'_, Vec<u8>, Vec<u8>>,
    expected: Option<&[u8]>,
    new: Option<Vec<u8>>,
) -> CasOutcome {
    match (entry, expected) {
        (Entry::Occupied(current), Some(expected)) if current.get().as_slice() == expected => {
            match new {
                Some(value) => {
                    let mut current = current;
                    current.insert(value);
                }
                None => {
                    current.remove();
                }
            }
            CasOutcome::Swapped
        }
        (Entry::Occupied(current), _) => CasOutcome::Conflict(Some(current.get().clone())),
        (Entry::Vacant(slot), None) => {
            if let Some(value) = new {
                slot.insert(value);
            }
            CasOutcome::Swapped
        }
        (Entry::Vacant(_), Some(_)) => CasOutcome::Conflict(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const KEY: &[u8] = b"fingerprint-key";

    // ==================== Conditional Write Tests ====================

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = InMemoryStore::new();
        assert_eq!(
            store
                .insert_if_absent(Keyspace::Records, KEY, b"first".to_vec())
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .insert_if_absent(Keyspace::Records, KEY, b"second".to_vec())
                .await
                .unwrap(),
            Some(b"first".to_vec())
        );
        assert_eq!(
            store.get(Keyspace::Records, KEY).await.unwrap(),
            Some(b"first".to_vec())
        );
    }

    #[tokio::test]
    async fn test_keyspaces_are_separate() {
        let store = InMemoryStore::new();
        store
            .insert_if_absent(Keyspace::Records, KEY, b"record".to_vec())
            .await
            .unwrap();
        assert_eq!(store.get(Keyspace::Locks, KEY).await.unwrap(), None);
        assert_eq!(store.len(Keyspace::Records), 1);
        assert!(store.is_empty(Keyspace::Locks));
    }

    #[tokio::test]
    async fn test_cas_swap_and_conflict() {
        let store = InMemoryStore::new();
        store
            .insert_if_absent(Keyspace::Records, KEY, b"v1".to_vec())
            .await
            .unwrap();

        let outcome = store
            .compare_and_swap(Keyspace::Records, KEY, Some(&b"v1"[..]), Some(b"v2".to_vec()))
            .await
            .unwrap();
        assert!(outcome.is_swapped());

        let stale = store
            .compare_and_swap(Keyspace::Records, KEY, Some(&b"v1"[..]), Some(b"v3".to_vec()))
            .await
            .unwrap();
        assert_eq!(stale, CasOutcome::Conflict(Some(b"v2".to_vec())));
    }

    #[tokio::test]
    async fn test_cas_delete_and_absent() {
        let store = InMemoryStore::new();
        let absent = store
            .compare_and_swap(Keyspace::Locks, KEY, Some(&b"x"[..]), None)
            .await
            .unwrap();
        assert_eq!(absent, CasOutcome::Conflict(None));

        assert!(store
            .compare_and_swap(Keyspace::Locks, KEY, None, Some(b"x".to_vec()))
            .await
            .unwrap()
            .is_swapped());
        assert!(store
            .compare_and_swap(Keyspace::Locks, KEY, Some(&b"x"[..]), None)
            .await
            .unwrap()
            .is_swapped());
        assert!(store.is_empty(Keyspace::Locks));
    }

    #[tokio::test]
    async fn test_record_write_sees_lease() {
        let store = InMemoryStore::new();
        let refuse = |held: Option<&[u8]>| match held {
            Some(_) => Err(crate::LedgerError::AlreadyLocked {
                holder: "other".into(),
                expires_in_ms: 1_000,
            }),
            None => Ok(()),
        };

        store
            .insert_if_absent(Keyspace::Locks, KEY, b"lease".to_vec())
            .await
            .unwrap();
        assert!(store
            .insert_record_if_absent(KEY, b"record".to_vec(), &refuse)
            .await
            .is_err());
        assert!(store
            .compare_and_swap_record(KEY, None, Some(b"record".to_vec()), &refuse)
            .await
            .is_err());
        assert!(store.is_empty(Keyspace::Records));

        store
            .compare_and_swap(Keyspace::Locks, KEY, Some(&b"lease"[..]), None)
            .await
            .unwrap();
        assert_eq!(
            store
                .insert_record_if_absent(KEY, b"record".to_vec(), &refuse)
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .compare_and_swap_record(KEY, Some(&b"other"[..]), None, &refuse)
                .await
                .unwrap(),
            CasOutcome::Conflict(Some(b"record".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_keys() {
        let store = InMemoryStore::new();
        for i in 0..5u8 {
            store
                .insert_if_absent(Keyspace::Records, &[i], vec![i])
                .await
                .unwrap();
        }
        let mut keys = store.keys(Keyspace::Records).await.unwrap();
        keys.sort();
        assert_eq!(keys, (0..5u8).map(|i| vec![i]).collect::<Vec<_>>());
    }

    // ==================== Thread Safety Tests ====================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_if_absent_single_winner() {
        use tokio::task::JoinSet;

        let store = Arc::new(InMemoryStore::new());
        let mut tasks = JoinSet::new();

        for i in 0..32u8 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                store
                    .insert_if_absent(Keyspace::Records, KEY, vec![i])
                    .await
                    .unwrap()
                    .is_none()
            });
        }

        let mut winners = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len(Keyspace::Records), 1);
    }

    // ==================== Property Tests ====================

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_first_insert_wins(values in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 1..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                for v in &values {
                    store.insert_if_absent(Keyspace::Records, KEY, v.clone()).await.unwrap();
                }
                let stored = store.get(Keyspace::Records, KEY).await.unwrap();
                prop_assert_eq!(stored, Some(values[0].clone()));
                Ok(())
            })?;
        }
    }
}
