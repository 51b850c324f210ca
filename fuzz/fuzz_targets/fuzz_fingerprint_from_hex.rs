//! Fuzz target for Fingerprint::from_hex.
//!
//! Tests that parsing arbitrary strings as fingerprints is handled safely.

#![no_main]

use genesis_identity::Fingerprint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Should succeed for valid 128-char hex, fail otherwise - never panic
        if let Ok(fingerprint) = Fingerprint::from_hex(s) {
            let hex = fingerprint.to_hex();
            assert_eq!(hex.len(), 128);
            let roundtrip = Fingerprint::from_hex(&hex).unwrap();
            assert_eq!(fingerprint, roundtrip);
        }
    }
});
