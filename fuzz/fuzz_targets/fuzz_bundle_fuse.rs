//! Fuzz target for biometric bundle decoding and fusion.
//!
//! Tests that arbitrary bundle JSON is either rejected or fuses
//! deterministically.

#![no_main]

use genesis_crypto::HashAlgorithm;
use genesis_identity::{BiometricBundle, BiometricFuser};
use libfuzzer_sys::fuzz_target;

const SALT: &[u8] = b"fuzz-salt";

fuzz_target!(|data: &[u8]| {
    let Ok(bundle) = serde_json::from_slice::<BiometricBundle>(data) else {
        return;
    };

    for algorithm in [HashAlgorithm::Sha3_512, HashAlgorithm::Blake3_512] {
        let fuser = BiometricFuser::new(algorithm, 1);
        match fuser.fuse(&bundle, SALT) {
            Ok(first) => {
                let second = fuser.fuse(&bundle, SALT).unwrap();
                assert_eq!(first, second);
            }
            Err(_) => assert!(bundle.populated_layers() < 1),
        }
    }
});
