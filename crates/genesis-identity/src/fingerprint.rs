//! Identity fingerprints.
//!
//! A `Fingerprint` is the 512-bit output of the biometric fuser. It is the
//! sole key under which the ledger stores an identity.
//!
//! ## Security Properties
//!
//! - **Constant-Time Comparison**: equality never short-circuits
//! - **Short Display**: logs carry only the first 16 hex characters

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use genesis_crypto::Hash512;

use crate::Result;

/// A 512-bit identity fingerprint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(Hash512);

impl Fingerprint {
    /// Size of the fingerprint in bytes.
    pub const SIZE: usize = Hash512::SIZE;

    /// Wrap a computed hash.
    pub fn from_hash(hash: Hash512) -> Self {
        Self(hash)
    }

    /// Create a fingerprint from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Crypto` if the input is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(Hash512::from_bytes(bytes)?))
    }

    /// Parse from a 128-character hex string.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Crypto` for malformed input.
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(Hash512::from_hex(s.trim())?))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        self.0.as_bytes()
    }

    /// Format as lowercase hex (128 characters).
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// First 16 hex characters followed by "...", for logs and UIs.
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("{}...", &hex[..16])
    }

    /// Underlying hash.
    pub fn as_hash512(&self) -> &Hash512 {
        &self.0
    }
}

impl ConstantTimeEq for Fingerprint {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Fingerprint {}

impl std::hash::Hash for Fingerprint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = crate::IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}
