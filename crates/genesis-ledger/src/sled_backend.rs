//! Sled-backed persistent ledger storage.
//!
//! Uses two sled trees:
//! - `genesis_identity_records`: fingerprint (64 bytes) → bincode `IdentityRecord`
//! - `genesis_identity_locks`: fingerprint (64 bytes) → bincode `LockRecord`
//!
//! Conditional writes map directly onto sled's `compare_and_swap`, which is
//! atomic per key. Lease-gated record writes run as a transaction over both
//! trees.
//!
//! Requires the `sled-storage` feature flag (enabled by default).

use std::path::Path;

use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

use crate::storage::{CasOutcome, Keyspace, LeaseCheck, LedgerStore};
use crate::{LedgerError, Result};

/// Tree name for identity records.
const RECORDS_TREE: &str = "genesis_identity_records";

/// Tree name for fingerprint leases.
const LOCKS_TREE: &str = "genesis_identity_locks";

fn storage_error(context: &str, e: sled::Error) -> LedgerError {
    LedgerError::LedgerUnavailable(format!("{}: {}", context, e))
}

fn transaction_error(context: &str, e: TransactionError<LedgerError>) -> LedgerError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => storage_error(context, e),
    }
}

/// Persistent ledger store backed by sled.
///
/// ## Thread Safety
///
/// `SledStore` is thread-safe. All sled operations are internally synchronized.
pub struct SledStore {
    db: sled::Db,
    records: sled::Tree,
    locks: sled::Tree,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("records", &self.records.len())
            .field("locks", &self.locks.len())
            .finish()
    }
}

impl SledStore {
    /// Open or create a sled-backed store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory for sled database files
    /// * `cache_mb` - Sled page cache size in megabytes
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` if the database cannot be opened.
    pub fn open(path: &Path, cache_mb: usize) -> Result<Self> {
        let config = sled::Config::new()
            .path(path)
            .cache_capacity((cache_mb * 1024 * 1024) as u64)
            .mode(sled::Mode::LowSpace)
            .flush_every_ms(Some(1000));

        let db = config.open().map_err(|e| storage_error("sled open", e))?;
        Self::from_db(db)
    }

    /// Open a throwaway store that is deleted on drop.
    ///
    /// # Errors
    ///
    /// Returns `LedgerUnavailable` if the database cannot be created.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| storage_error("sled open temporary", e))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let records = db
            .open_tree(RECORDS_TREE)
            .map_err(|e| storage_error("open records tree", e))?;
        let locks = db
            .open_tree(LOCKS_TREE)
            .map_err(|e| storage_error("open locks tree", e))?;
        Ok(Self { db, records, locks })
    }

    /// Get the sled database instance.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, space: Keyspace) -> &sled::Tree {
        match space {
            Keyspace::Records => &self.records,
            Keyspace::Locks => &self.locks,
        }
    }
}

#[async_trait]
impl LedgerStore for SledStore {
    async fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .tree(space)
            .get(key)
            .map_err(|e| storage_error(space.as_str(), e))?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn insert_if_absent(
        &self,
        space: Keyspace,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        let result = self
            .tree(space)
            .compare_and_swap(key, None::<&[u8]>, Some(value))
            .map_err(|e| storage_error(space.as_str(), e))?;
        match result {
            Ok(()) => Ok(None),
            Err(conflict) => Ok(conflict.current.map(|v| v.to_vec())),
        }
    }

    async fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<CasOutcome> {
        let result = self
            .tree(space)
            .compare_and_swap(key, expected, new)
            .map_err(|e| storage_error(space.as_str(), e))?;
        match result {
            Ok(()) => Ok(CasOutcome::Swapped),
            Err(conflict) => Ok(CasOutcome::Conflict(conflict.current.map(|v| v.to_vec()))),
        }
    }

    async fn insert_record_if_absent(
        &self,
        key: &[u8],
        value: Vec<u8>,
        lease: LeaseCheck<'_>,
    ) -> Result<Option<Vec<u8>>> {
        (&self.records, &self.locks)
            .transaction(|(records, locks)| {
                let held = locks.get(key)?;
                lease(held.as_deref()).map_err(ConflictableTransactionError::Abort)?;
                if let Some(existing) = records.get(key)? {
                    return Ok(Some(existing.to_vec()));
                }
                records.insert(key, value.as_slice())?;
                Ok(None)
            })
            .map_err(|e| transaction_error("insert record", e))
    }

    async fn compare_and_swap_record(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
        lease: LeaseCheck<'_>,
    ) -> Result<CasOutcome> {
        (&self.records, &self.locks)
            .transaction(|(records, locks)| {
                let held = locks.get(key)?;
                lease(held.as_deref()).map_err(ConflictableTransactionError::Abort)?;
                let current = records.get(key)?;
                if current.as_deref() != expected {
                    return Ok(CasOutcome::Conflict(current.map(|v| v.to_vec())));
                }
                match &new {
                    Some(value) => {
                        records.insert(key, value.as_slice())?;
                    }
                    None => {
                        records.remove(key)?;
                    }
                }
                Ok(CasOutcome::Swapped)
            })
            .map_err(|e| transaction_error("swap record", e))
    }

    async fn keys(&self, space: Keyspace) -> Result<Vec<Vec<u8>>> {
        self.tree(space)
            .iter()
            .keys()
            .map(|k| {
                k.map(|k| k.to_vec())
                    .map_err(|e| storage_error(space.as_str(), e))
            })
            .collect()
    }

    fn len(&self, space: Keyspace) -> usize {
        self.tree(space).len()
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| storage_error("flush", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
