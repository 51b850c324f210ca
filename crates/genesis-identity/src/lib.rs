//! # genesis-identity
//!
//! Identity primitives for the GENESIS core.
//!
//! Provides:
//! - Biometric channels, digests and bundles
//! - 512-bit identity fingerprints with constant-time comparison
//! - The biometric fuser that binds a bundle to a salted secret
//! - Identity records and their status state machine

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod biometric;
pub mod error;
pub mod fingerprint;
pub mod fuser;
pub mod lifecycle;

#[cfg(test)]
mod proptests;

pub use biometric::{BiometricBundle, BiometricChannel, BiometricDigest, MAX_DIGEST_LEN};
pub use error::{IdentityError, Result};
pub use fingerprint::Fingerprint;
pub use fuser::{derive_salt, BiometricFuser, DEFAULT_MIN_AUTH_LAYERS};
pub use lifecycle::{IdentityRecord, IdentityStatus, LockState};
