//! Hashing primitives.
//!
//! Provides a 256-bit BLAKE3 hash used for integrity checksums and a 512-bit
//! hash used for identity fingerprints. The 512-bit hash is SHA3-512 by
//! default, or BLAKE3 in extendable-output mode when configured.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// A 256-bit (32-byte) hash value using BLAKE3.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Hash size in bytes.
    pub const SIZE: usize = 32;

    /// Create a Hash256 from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CryptoError::InvalidHashLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to owned byte array.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Hash a single input.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash multiple inputs.
    ///
    /// Each input is length-prefixed to prevent ambiguity.
    pub fn hash_many(inputs: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for input in inputs {
            hasher.update(&(input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Format as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl ConstantTimeEq for Hash256 {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl PartialEq for Hash256 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Hash256 {}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", &self.to_hex()[..16])
    }
}

/// Algorithm used to produce 512-bit digests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    /// SHA3-512 (FIPS 202).
    #[default]
    #[serde(rename = "sha3-512")]
    Sha3_512,
    /// BLAKE3 in extendable-output mode, truncated to 64 bytes.
    #[serde(rename = "blake3-512")]
    Blake3_512,
}

impl HashAlgorithm {
    /// Start an incremental hash with this algorithm.
    pub fn hasher(self) -> Hasher512 {
        match self {
            HashAlgorithm::Sha3_512 => Hasher512::Sha3(Box::default()),
            HashAlgorithm::Blake3_512 => Hasher512::Blake3(Box::default()),
        }
    }

    /// Stable configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha3_512 => "sha3-512",
            HashAlgorithm::Blake3_512 => "blake3-512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha3-512" | "sha3_512" => Ok(HashAlgorithm::Sha3_512),
            "blake3-512" | "blake3_512" => Ok(HashAlgorithm::Blake3_512),
            other => Err(CryptoError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Incremental 512-bit hasher.
pub enum Hasher512 {
    /// SHA3-512 state.
    Sha3(Box<Sha3_512>),
    /// BLAKE3 state.
    Blake3(Box<blake3::Hasher>),
}

impl Hasher512 {
    /// Feed raw bytes.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match self {
            Hasher512::Sha3(h) => Digest::update(h.as_mut(), data),
            Hasher512::Blake3(h) => {
                h.update(data);
            }
        }
        self
    }

    /// Feed bytes preceded by their 64-bit little-endian length.
    pub fn update_prefixed(&mut self, data: &[u8]) -> &mut Self {
        self.update(&(data.len() as u64).to_le_bytes());
        self.update(data)
    }

    /// Consume the hasher and produce the digest.
    pub fn finalize(self) -> Hash512 {
        let mut out = [0u8; 64];
        match self {
            Hasher512::Sha3(h) => out.copy_from_slice(&Digest::finalize(*h)),
            Hasher512::Blake3(h) => h.finalize_xof().fill(&mut out),
        }
        Hash512(out)
    }
}

/// A 512-bit (64-byte) hash value.
#[derive(Clone, Zeroize)]
pub struct Hash512([u8; 64]);

impl Hash512 {
    /// Hash size in bytes.
    pub const SIZE: usize = 64;

    /// Create a Hash512 from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(CryptoError::InvalidHashLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Hash multiple length-prefixed inputs with the given algorithm.
    pub fn hash_many(algorithm: HashAlgorithm, inputs: &[&[u8]]) -> Self {
        let mut hasher = algorithm.hasher();
        for input in inputs {
            hasher.update_prefixed(input);
        }
        hasher.finalize()
    }

    /// Get the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Format as hex string (128 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 128-character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has the wrong length or is not hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != Self::SIZE * 2 {
            return Err(CryptoError::InvalidHashLength {
                expected: Self::SIZE * 2,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHexFormat(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Check if this hash is all zeros (constant time).
    pub fn is_zero(&self) -> bool {
        self.0[..].ct_eq(&[0u8; 64][..]).into()
    }
}

impl ConstantTimeEq for Hash512 {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl PartialEq for Hash512 {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for Hash512 {}

impl std::hash::Hash for Hash512 {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Bucket selection only.
        self.0.hash(state);
    }
}

impl fmt::Debug for Hash512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash512({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Hash512 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Hex in human-readable formats (JSON), raw bytes otherwise (bincode).
impl Serialize for Hash512 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Hash512 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct Hash512Visitor;

        impl<'de> Visitor<'de> for Hash512Visitor {
            type Value = Hash512;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("64 bytes or a 128-character hex string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Hash512, E> {
                Hash512::from_hex(v).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Hash512, E> {
                Hash512::from_bytes(v).map_err(E::custom)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Hash512, A::Error> {
                let mut bytes = Vec::with_capacity(Hash512::SIZE);
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Hash512::from_bytes(&bytes).map_err(de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(Hash512Visitor)
        } else {
            deserializer.deserialize_bytes(Hash512Visitor)
        }
    }
}
