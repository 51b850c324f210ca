//! # genesis-ledger
//!
//! The authoritative identity ledger.
//!
//! Guarantees that a fingerprint is bound to at most one [`IdentityRecord`]
//! system-wide. Uniqueness rests on the store's conditional writes
//! (`insert_if_absent`, `compare_and_swap`), not on application locks, so it
//! holds under any interleaving of concurrent callers.
//!
//! Provides:
//! - [`LedgerStore`]: async key-value abstraction with conditional writes
//! - [`InMemoryStore`]: sharded in-memory backend
//! - [`SledStore`]: persistent backend (feature `sled-storage`)
//! - [`IdentityLedger`]: registration, lookup, status transitions and
//!   per-fingerprint leases
//!
//! [`IdentityRecord`]: genesis_identity::IdentityRecord

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ledger;
pub mod lock;
pub mod storage;

#[cfg(feature = "sled-storage")]
pub mod sled_backend;

pub use error::{LedgerError, Result};
pub use ledger::{IdentityLedger, LedgerConfig};
pub use lock::{LockGuard, LockRecord, LockToken};
pub use storage::{CasOutcome, InMemoryStore, Keyspace, LeaseCheck, LedgerStore};

#[cfg(feature = "sled-storage")]
pub use sled_backend::SledStore;
