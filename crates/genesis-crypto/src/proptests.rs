//! Property-based tests for hashing and threshold sharing.
//!
//! - Any `k` of `n` shares reconstruct the original secret
//! - Fewer than `k` distinct shares never reconstruct
//! - Tampering with any payload byte is detected
//! - 512-bit hashes are deterministic and hex-roundtrip

use proptest::prelude::*;

use crate::{reconstruct, split, CryptoError, Hash512, HashAlgorithm};

/// Generate `(secret, n, k)` with `2 <= k <= n <= 12`.
fn split_params() -> impl Strategy<Value = (Vec<u8>, usize, usize)> {
    (prop::collection::vec(any::<u8>(), 1..96), 2usize..=12)
        .prop_flat_map(|(secret, n)| (Just(secret), Just(n), 2usize..=n))
}

/// Generate `(secret, n, k, picks)` where `picks` is an arbitrary
/// `k`-subset of share positions `0..n`, shuffled.
fn split_with_subset() -> impl Strategy<Value = (Vec<u8>, usize, usize, Vec<usize>)> {
    split_params().prop_flat_map(|(secret, n, k)| {
        (
            Just(secret),
            Just(n),
            Just(k),
            prop::sample::subsequence((0..n).collect::<Vec<_>>(), k).prop_shuffle(),
        )
    })
}

// ==================== Threshold Sharing ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any `k`-subset of shares, in any order, reconstructs the secret.
    #[test]
    fn any_k_shares_reconstruct((secret, n, k, picks) in split_with_subset()) {
        let shares = split(&secret, n, k).unwrap();
        let subset: Vec<_> = picks.iter().map(|&i| shares[i].clone()).collect();
        let recovered = reconstruct(&subset).unwrap();
        prop_assert_eq!(recovered.as_slice(), secret.as_slice());
    }

    /// `k - 1` shares are never enough.
    #[test]
    fn fewer_than_k_fails((secret, n, k) in split_params()) {
        let shares = split(&secret, n, k).unwrap();
        let result = reconstruct(&shares[..k - 1]);
        let is_insufficient = matches!(
            result,
            Err(CryptoError::InsufficientShares { required, provided })
                if required == k && provided == k - 1
        );
        prop_assert!(is_insufficient);
    }

    /// Flipping any payload bit is reported as a corrupt share.
    #[test]
    fn tampering_detected((secret, n, k) in split_params(), pick in any::<prop::sample::Index>(), bit in 0u8..8) {
        let mut shares = split(&secret, n, k).unwrap();
        let victim = pick.index(k);
        let byte = pick.index(secret.len());
        shares[victim].payload[byte] ^= 1 << bit;
        let is_corrupt = matches!(reconstruct(&shares[..k]), Err(CryptoError::CorruptShare { .. }));
        prop_assert!(is_corrupt);
    }
}

// ==================== 512-bit Hashing ====================

proptest! {
    #[test]
    fn hash512_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        for algorithm in [HashAlgorithm::Sha3_512, HashAlgorithm::Blake3_512] {
            let a = Hash512::hash_many(algorithm, &[data.as_slice()]);
            let b = Hash512::hash_many(algorithm, &[data.as_slice()]);
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn hash512_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
        let hash = Hash512::hash_many(HashAlgorithm::Sha3_512, &[bytes.as_slice()]);
        let parsed = Hash512::from_hex(&hash.to_hex()).unwrap();
        prop_assert_eq!(hash, parsed);
    }

    /// Moving a byte across a boundary changes the length-prefixed hash.
    #[test]
    fn hash512_boundaries_matter(a in prop::collection::vec(any::<u8>(), 1..32), b in prop::collection::vec(any::<u8>(), 0..32)) {
        let mut shifted_a = a.clone();
        let moved = shifted_a.pop().unwrap();
        let mut shifted_b = vec![moved];
        shifted_b.extend_from_slice(&b);

        let h1 = Hash512::hash_many(HashAlgorithm::Sha3_512, &[a.as_slice(), b.as_slice()]);
        let h2 = Hash512::hash_many(HashAlgorithm::Sha3_512, &[shifted_a.as_slice(), shifted_b.as_slice()]);
        prop_assert_ne!(h1, h2);
    }
}
