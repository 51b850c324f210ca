//! Biometric fusion.
//!
//! Fusion binds a bundle of channel digests and a secret-derived salt into a
//! single [`Fingerprint`]:
//!
//! ```text
//! H(FUSION_DOMAIN || for each populated channel, sorted by name:
//!       len(name) || name || len(digest) || digest
//!   || len(salt) || salt)
//! ```
//!
//! Lengths are 64-bit little-endian. The result is independent of the order
//! in which channels were inserted.

use genesis_crypto::{Hash512, HashAlgorithm};

use crate::{BiometricBundle, Fingerprint, IdentityError, Result};

/// Default minimum number of populated channels.
pub const DEFAULT_MIN_AUTH_LAYERS: usize = 3;

/// Domain separator for fingerprint fusion.
const FUSION_DOMAIN: &[u8] = b"GENESIS-FINGERPRINT-FUSION-v1";

/// Domain separator for salt derivation.
const SALT_DOMAIN: &[u8] = b"GENESIS-FUSION-SALT-v1";

/// Derive the fusion salt from a reconstructed secret.
///
/// Always SHA3-512, so the salt is independent of the configured fingerprint
/// algorithm.
pub fn derive_salt(secret: &[u8]) -> Hash512 {
    Hash512::hash_many(HashAlgorithm::Sha3_512, &[SALT_DOMAIN, secret])
}

/// Fuses biometric bundles into fingerprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BiometricFuser {
    algorithm: HashAlgorithm,
    min_auth_layers: usize,
}

impl BiometricFuser {
    /// Create a fuser.
    ///
    /// A `min_auth_layers` of zero is treated as one: an empty bundle never
    /// fuses.
    pub fn new(algorithm: HashAlgorithm, min_auth_layers: usize) -> Self {
        Self {
            algorithm,
            min_auth_layers: min_auth_layers.max(1),
        }
    }

    /// Configured hash algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Configured minimum number of populated channels.
    pub fn min_auth_layers(&self) -> usize {
        self.min_auth_layers
    }

    /// Fuse a bundle and salt into a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientLayers` if fewer than `min_auth_layers` channels
    /// carry a non-empty digest.
    pub fn fuse(&self, bundle: &BiometricBundle, salt: &[u8]) -> Result<Fingerprint> {
        let present = bundle.populated_layers();
        if present < self.min_auth_layers {
            return Err(IdentityError::InsufficientLayers {
                required: self.min_auth_layers,
                present,
            });
        }

        let mut hasher = self.algorithm.hasher();
        hasher.update(FUSION_DOMAIN);
        for (channel, digest) in bundle.canonical_entries() {
            hasher.update_prefixed(channel.as_str().as_bytes());
            hasher.update_prefixed(digest.as_bytes());
        }
        hasher.update_prefixed(salt);

        Ok(Fingerprint::from_hash(hasher.finalize()))
    }
}

impl Default for BiometricFuser {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), DEFAULT_MIN_AUTH_LAYERS)
    }
}
