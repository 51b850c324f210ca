//! Property-based tests for identity components.
//!
//! - Fusion is independent of channel insertion order
//! - Bundles with fewer than the minimum populated layers never fuse
//! - Fingerprints hex-roundtrip

use proptest::prelude::*;

use crate::{BiometricBundle, BiometricChannel, BiometricDigest, BiometricFuser, Fingerprint, IdentityError};

fn channel_digests() -> impl Strategy<Value = Vec<(BiometricChannel, Vec<u8>)>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..=64), 5).prop_map(|digests| {
        BiometricChannel::ALL.into_iter().zip(digests).collect()
    })
}

fn build(entries: &[(BiometricChannel, Vec<u8>)]) -> BiometricBundle {
    entries
        .iter()
        .map(|(c, d)| (*c, BiometricDigest::new(d.clone()).unwrap()))
        .collect()
}

proptest! {
    /// Any permutation of the same entries fuses to the same fingerprint.
    #[test]
    fn fusion_is_order_independent(
        entries in channel_digests(),
        shuffled in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
        salt in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let fuser = BiometricFuser::default();
        let forward = build(&entries);
        let permuted_entries: Vec<_> = shuffled.iter().map(|&i| entries[i].clone()).collect();

        let mut permuted = BiometricBundle::new();
        for (c, d) in &permuted_entries {
            permuted.insert(*c, BiometricDigest::new(d.clone()).unwrap());
        }

        prop_assert_eq!(fuser.fuse(&forward, &salt).unwrap(), fuser.fuse(&permuted, &salt).unwrap());
    }

    /// Bundles below the layer minimum are rejected with the exact count.
    #[test]
    fn insufficient_layers_rejected(entries in channel_digests(), keep in 0usize..3) {
        let fuser = BiometricFuser::default();
        let bundle = build(&entries[..keep]);
        let result = fuser.fuse(&bundle, b"salt");
        let expected = IdentityError::InsufficientLayers { required: 3, present: keep };
        prop_assert_eq!(result.unwrap_err(), expected);
    }

    /// Distinct salts yield distinct fingerprints.
    #[test]
    fn salts_separate(entries in channel_digests(), a in prop::collection::vec(any::<u8>(), 1..32), b in prop::collection::vec(any::<u8>(), 1..32)) {
        prop_assume!(a != b);
        let fuser = BiometricFuser::default();
        let bundle = build(&entries);
        prop_assert_ne!(fuser.fuse(&bundle, &a).unwrap(), fuser.fuse(&bundle, &b).unwrap());
    }

    #[test]
    fn fingerprint_hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 64)) {
        let fp = Fingerprint::from_bytes(&bytes).unwrap();
        prop_assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
    }
}
