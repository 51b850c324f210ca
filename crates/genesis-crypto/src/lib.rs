//! # genesis-crypto
//!
//! Cryptographic primitives for the GENESIS identity core.
//!
//! This crate provides:
//! - **SHA3-512** and **BLAKE3** hashing ([`Hash256`], [`Hash512`])
//! - **Shamir secret sharing** over GF(2^8) ([`shamir`])
//!
//! ## Security
//!
//! Secret material is zeroized with `zeroize`; digest comparisons are
//! constant-time via `subtle`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod shamir;

#[cfg(test)]
mod proptests;

pub use error::{CryptoError, Result};
pub use hash::{HashAlgorithm, Hash256, Hash512};
pub use shamir::{reconstruct, split, split_with_rng, SecretShare, MAX_SHARES};
