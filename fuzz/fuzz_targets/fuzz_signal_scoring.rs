//! Fuzz target for session signal decoding and risk scoring.
//!
//! Tests that any accepted signal batch yields a bounded score.

#![no_main]

use chrono::{TimeZone, Utc};
use genesis_cap::{RiskScorer, SessionRiskState, SessionSignal, SignalBatch, RISK_MAX, RISK_MIN};
use genesis_identity::Fingerprint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(signals) = serde_json::from_slice::<Vec<SessionSignal>>(data) else {
        return;
    };

    let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let batch = SignalBatch::at(t0, signals);
    if batch.validate().is_err() {
        return;
    }

    let scorer = RiskScorer::default();
    let fingerprint = Fingerprint::from_bytes(&[7u8; 64]).unwrap();
    let state = SessionRiskState::new("fuzz", fingerprint, t0);

    let next = scorer.score(&state, &batch);
    assert!(next.risk_score >= RISK_MIN && next.risk_score <= RISK_MAX);
    assert_eq!(next.tier, scorer.thresholds().tier_for(next.risk_score));
});
