//! Threshold secret sharing (Shamir over GF(2^8)).
//!
//! A secret is split byte-wise: for every byte a random polynomial of degree
//! `k - 1` is drawn with the secret byte as its constant term, and share `i`
//! carries the evaluation at `x = i`. Any `k` shares recover the constant
//! terms by Lagrange interpolation at `x = 0`; fewer than `k` shares are
//! consistent with every possible secret.
//!
//! Each share carries a random `split_id` so shares of different secrets are
//! never mixed, and a BLAKE3 checksum binding the payload to its index and
//! parameters.

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::hash::Hash256;
use crate::{CryptoError, Result};

/// Maximum number of shares (share indices are non-zero field elements).
pub const MAX_SHARES: usize = 255;

/// Size of the random split identifier.
pub const SPLIT_ID_SIZE: usize = 16;

/// Domain separator for share checksums.
const SHARE_CHECKSUM_DOMAIN: &[u8] = b"GENESIS-SHARE-CHECKSUM-v1";

/// GF(2^8) arithmetic over the Rijndael polynomial x^8 + x^4 + x^3 + x + 1.
mod gf256 {
    const IRREDUCIBLE: u16 = 0x11B;

    const EXP_TABLE: [u8; 512] = generate_exp_table();
    const LOG_TABLE: [u8; 256] = generate_log_table();

    const fn generate_exp_table() -> [u8; 512] {
        let mut table = [0u8; 512];
        let mut x: u8 = 1;
        let mut i = 0;
        while i < 255 {
            table[i] = x;
            table[i + 255] = x;
            x = multiply_slow(x, 0x03);
            i += 1;
        }
        table[510] = table[0];
        table[511] = table[1];
        table
    }

    const fn generate_log_table() -> [u8; 256] {
        let mut table = [0u8; 256];
        let mut x: u8 = 1;
        let mut i = 0;
        while i < 255 {
            table[x as usize] = i as u8;
            x = multiply_slow(x, 0x03);
            i += 1;
        }
        table
    }

    const fn multiply_slow(a: u8, b: u8) -> u8 {
        let mut result: u16 = 0;
        let mut a_val = a as u16;
        let mut b_val = b as u16;
        let mut i = 0;
        while i < 8 {
            if (b_val & 1) != 0 {
                result ^= a_val;
            }
            let carry = (a_val & 0x80) != 0;
            a_val <<= 1;
            if carry {
                a_val ^= IRREDUCIBLE;
            }
            b_val >>= 1;
            i += 1;
        }
        result as u8
    }

    #[inline]
    pub fn add(a: u8, b: u8) -> u8 {
        a ^ b
    }

    #[inline]
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let log_a = LOG_TABLE[a as usize] as usize;
        let log_b = LOG_TABLE[b as usize] as usize;
        EXP_TABLE[log_a + log_b]
    }

    /// Divide `a` by a non-zero `b`.
    #[inline]
    pub fn div(a: u8, b: u8) -> u8 {
        debug_assert!(b != 0, "division by zero in GF(2^8)");
        if a == 0 || b == 0 {
            return 0;
        }
        let log_a = LOG_TABLE[a as usize] as usize;
        let log_b = LOG_TABLE[b as usize] as usize;
        EXP_TABLE[log_a + 255 - log_b]
    }

    /// Evaluate a polynomial (constant term first) at `x` using Horner's method.
    pub fn eval_polynomial(coefficients: &[u8], x: u8) -> u8 {
        coefficients
            .iter()
            .rev()
            .fold(0u8, |acc, &c| add(mul(acc, x), c))
    }

}

/// One share of a split secret.
#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct SecretShare {
    /// Evaluation point, in `1..=total_shares`.
    pub index: u8,
    /// Polynomial evaluations, one byte per secret byte.
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// Total shares produced by the split (n).
    pub total_shares: u8,
    /// Shares required to reconstruct (k).
    pub threshold: u8,
    /// Random identifier shared by every share of one split.
    #[serde(with = "hex_array")]
    pub split_id: [u8; SPLIT_ID_SIZE],
    /// Integrity checksum over the fields above.
    #[serde(with = "hex_array")]
    pub checksum: [u8; 32],
}

impl Drop for SecretShare {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}

impl SecretShare {
    fn compute_checksum(
        index: u8,
        payload: &[u8],
        total_shares: u8,
        threshold: u8,
        split_id: &[u8; SPLIT_ID_SIZE],
    ) -> [u8; 32] {
        Hash256::hash_many(&[
            SHARE_CHECKSUM_DOMAIN,
            split_id.as_slice(),
            &[index, total_shares, threshold][..],
            payload,
        ])
        .to_bytes()
    }

    /// Check the share's checksum in constant time.
    pub fn verify_checksum(&self) -> bool {
        let expected = Self::compute_checksum(
            self.index,
            &self.payload,
            self.total_shares,
            self.threshold,
            &self.split_id,
        );
        expected[..].ct_eq(&self.checksum[..]).into()
    }

    /// Check that the index is a valid evaluation point for this split.
    pub fn has_valid_index(&self) -> bool {
        self.index != 0 && self.index <= self.total_shares
    }
}

impl std::fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretShare")
            .field("index", &self.index)
            .field("total_shares", &self.total_shares)
            .field("threshold", &self.threshold)
            .field("split_id", &hex::encode(self.split_id))
            .field("payload", &"[REDACTED]")
            .finish()
    }
}

fn validate_parameters(total: usize, threshold: usize) -> Result<()> {
    if threshold < 2 || threshold > total || total > MAX_SHARES {
        return Err(CryptoError::InvalidThreshold { threshold, total });
    }
    Ok(())
}

/// Split `secret` into `total` shares, any `threshold` of which reconstruct it.
///
/// Randomness comes from the operating system.
///
/// # Errors
///
/// Returns `InvalidThreshold` unless `1 < threshold <= total <= 255`, and
/// `EmptySecret` for a zero-length secret.
pub fn split(secret: &[u8], total: usize, threshold: usize) -> Result<Vec<SecretShare>> {
    split_with_rng(secret, total, threshold, &mut OsRng)
}

/// Split `secret` using the supplied random number generator.
///
/// # Errors
///
/// Same as [`split`].
pub fn split_with_rng<R: RngCore + CryptoRng>(
    secret: &[u8],
    total: usize,
    threshold: usize,
    rng: &mut R,
) -> Result<Vec<SecretShare>> {
    validate_parameters(total, threshold)?;
    if secret.is_empty() {
        return Err(CryptoError::EmptySecret);
    }

    let mut split_id = [0u8; SPLIT_ID_SIZE];
    rng.try_fill_bytes(&mut split_id)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;

    let mut payloads: Vec<Vec<u8>> = (0..total).map(|_| Vec::with_capacity(secret.len())).collect();
    let mut coefficients = Zeroizing::new(vec![0u8; threshold]);

    for &byte in secret {
        coefficients[0] = byte;
        rng.try_fill_bytes(&mut coefficients[1..])
            .map_err(|e| CryptoError::Rng(e.to_string()))?;

        for (i, payload) in payloads.iter_mut().enumerate() {
            let x = (i + 1) as u8;
            payload.push(gf256::eval_polynomial(&coefficients, x));
        }
    }

    let total_u8 = total as u8;
    let threshold_u8 = threshold as u8;
    let shares = payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| {
            let index = (i + 1) as u8;
            let checksum =
                SecretShare::compute_checksum(index, &payload, total_u8, threshold_u8, &split_id);
            SecretShare {
                index,
                payload,
                total_shares: total_u8,
                threshold: threshold_u8,
                split_id,
                checksum,
            }
        })
        .collect();

    Ok(shares)
}

/// Reconstruct the secret from at least `threshold` distinct valid shares.
///
/// Every supplied share is validated before interpolation. Duplicate indices
/// carrying identical payloads are counted once.
///
/// # Errors
///
/// - `CorruptShare` if a checksum fails, an index is out of range, or two
///   shares claim the same index with different payloads
/// - `MismatchedShares` if shares come from different splits
/// - `InsufficientShares` if fewer than `threshold` distinct shares remain
/// - `InvalidThreshold` if the shares claim split parameters outside
///   `1 < threshold <= total`
pub fn reconstruct(shares: &[SecretShare]) -> Result<Zeroizing<Vec<u8>>> {
    let first = shares.first().ok_or(CryptoError::InsufficientShares {
        required: 2,
        provided: 0,
    })?;
    // Checksums are unkeyed, so the claimed parameters are untrusted.
    validate_parameters(usize::from(first.total_shares), usize::from(first.threshold))?;

    let threshold = first.threshold as usize;
    let mut distinct: BTreeMap<u8, &SecretShare> = BTreeMap::new();

    for share in shares {
        if !share.verify_checksum() || !share.has_valid_index() {
            return Err(CryptoError::CorruptShare { index: share.index });
        }
        if share.split_id != first.split_id {
            return Err(CryptoError::MismatchedShares(format!(
                "share {} has a different split id",
                share.index
            )));
        }
        if share.threshold != first.threshold
            || share.total_shares != first.total_shares
            || share.payload.len() != first.payload.len()
        {
            return Err(CryptoError::MismatchedShares(format!(
                "share {} disagrees on split parameters",
                share.index
            )));
        }
        if let Some(existing) = distinct.get(&share.index) {
            if !bool::from(existing.payload[..].ct_eq(&share.payload[..])) {
                return Err(CryptoError::CorruptShare { index: share.index });
            }
            continue;
        }
        distinct.insert(share.index, share);
    }

    if distinct.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            provided: distinct.len(),
        });
    }

    let selected: Vec<&SecretShare> = distinct.into_values().take(threshold).collect();

    // Lagrange basis at x = 0: L_i(0) = prod_{j != i} x_j / (x_i - x_j).
    let bases: Vec<u8> = selected
        .iter()
        .enumerate()
        .map(|(i, share_i)| {
            let mut numerator = 1u8;
            let mut denominator = 1u8;
            for (j, share_j) in selected.iter().enumerate() {
                if i != j {
                    numerator = gf256::mul(numerator, share_j.index);
                    denominator = gf256::mul(denominator, gf256::add(share_i.index, share_j.index));
                }
            }
            gf256::div(numerator, denominator)
        })
        .collect();

    let len = first.payload.len();
    let mut secret = Zeroizing::new(Vec::with_capacity(len));
    for byte_idx in 0..len {
        let byte = selected
            .iter()
            .zip(&bases)
            .fold(0u8, |acc, (share, &basis)| {
                gf256::add(acc, gf256::mul(share.payload[byte_idx], basis))
            });
        secret.push(byte);
    }

    Ok(secret)
}

/// Serde helpers encoding byte vectors as lowercase hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers encoding fixed-size arrays as lowercase hex strings.
mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; N];
        hex::decode_to_slice(s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}
