//! # genesis-core
//!
//! Registration and verification orchestration for the GENESIS identity
//! core.
//!
//! This is the main entry point for services embedding GENESIS.
//!
//! ## Quick Start
//!
//! ```no_run
//! use genesis_core::{GenesisConfig, Orchestrator, RegistrationRequest};
//! use genesis_crypto::split;
//! use genesis_identity::{BiometricBundle, BiometricChannel};
//!
//! # async fn run() -> genesis_core::Result<()> {
//! let orchestrator = Orchestrator::open(GenesisConfig::in_memory())?;
//!
//! let shards = split(b"NID-7741-0192-5530", 5, 3)?;
//! let bundle = BiometricBundle::new()
//!     .with_bytes(BiometricChannel::Fingerprint, &[0x11; 32])?
//!     .with_bytes(BiometricChannel::Iris, &[0x22; 32])?
//!     .with_bytes(BiometricChannel::Face, &[0x33; 32])?;
//!
//! let registered = orchestrator
//!     .register(RegistrationRequest::new(bundle, shards[..3].to_vec()))
//!     .await?;
//! println!("Registered {}", registered.fingerprint.short());
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - A fingerprint is bound to at most one ledger record, enforced by the
//!   store's conditional write
//! - Nothing is written when input validation fails
//! - Every mutating ledger call runs under a per-fingerprint lease that is
//!   released on every exit path, including cancellation
//! - Transient failures are retried with exponential backoff; contention
//!   and state-machine outcomes are returned to the caller untouched
//!
//! ## Events
//!
//! Take the receiver with [`Orchestrator::take_event_receiver`] to observe
//! registrations, status changes, risk escalations and ended sessions.
//!
//! ## Maintenance
//!
//! [`LedgerMonitor`] purges expired leases and evicts idle sessions. The
//! process owner spawns it; the core never starts background work on its
//! own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod orchestrator;
pub mod request;
pub mod session;

pub use config::{ConfigError, GenesisConfig, GenesisConfigBuilder, RetryConfig, StorageConfig};
pub use error::{CoreError, ErrorCategory, ErrorKind, ErrorResponse, Result};
pub use events::{EventBus, GenesisEvent, SessionEndReason};
pub use monitor::{LedgerMonitor, MonitorHandle, MonitorReport, MonitorStats};
pub use orchestrator::Orchestrator;
pub use request::{
    RegistrationRequest, RegistrationResponse, VerificationRequest, VerificationResponse,
};
pub use session::{Evaluation, SessionPolicy, SessionRegistry};
