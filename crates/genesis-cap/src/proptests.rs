//! Property-based tests for risk scoring.
//!
//! - Scores always stay within `[RISK_MIN, RISK_MAX]`
//! - With no anomalies, risk never increases
//! - The tier always matches the score

use chrono::{Duration, Utc};
use genesis_identity::Fingerprint;
use proptest::prelude::*;

use crate::{RiskScorer, RiskThresholds, SessionRiskState, SessionSignal, SignalBatch, RISK_MAX, RISK_MIN};

fn signal() -> impl Strategy<Value = SessionSignal> {
    prop_oneof![
        (0.0f64..5000.0).prop_map(|distance_km| SessionSignal::GeolocationJump { distance_km }),
        (0.0f64..=1.0).prop_map(|deviation| SessionSignal::BehavioralDeviation { deviation }),
        Just(SessionSignal::NewDevice),
        Just(SessionSignal::FailedChallenge),
        Just(SessionSignal::Nominal),
    ]
}

fn state(score: f64) -> SessionRiskState {
    let fp = Fingerprint::from_bytes(&[3u8; 64]).unwrap();
    let mut s = SessionRiskState::new("prop", fp, Utc::now());
    s.risk_score = score;
    s
}

proptest! {
    #[test]
    fn score_stays_in_range(
        start in RISK_MIN..=RISK_MAX,
        elapsed in -600i64..3600,
        signals in prop::collection::vec(signal(), 0..12),
    ) {
        let scorer = RiskScorer::default();
        let before = state(start);
        let batch = SignalBatch::at(before.last_evaluated_at + Duration::seconds(elapsed), signals);
        let after = scorer.score(&before, &batch);
        prop_assert!(after.risk_score >= RISK_MIN);
        prop_assert!(after.risk_score <= RISK_MAX);
    }

    #[test]
    fn nominal_never_increases(start in RISK_MIN..=RISK_MAX, elapsed in 0i64..3600, n in 0usize..4) {
        let scorer = RiskScorer::default();
        let before = state(start);
        let batch = SignalBatch::at(
            before.last_evaluated_at + Duration::seconds(elapsed),
            vec![SessionSignal::Nominal; n],
        );
        prop_assert!(scorer.score(&before, &batch).risk_score <= start);
    }

    #[test]
    fn tier_matches_score(start in RISK_MIN..=RISK_MAX, signals in prop::collection::vec(signal(), 0..6)) {
        let scorer = RiskScorer::default();
        let before = state(start);
        let after = scorer.score(&before, &SignalBatch::at(before.last_evaluated_at, signals));
        prop_assert_eq!(after.tier, RiskThresholds::default().tier_for(after.risk_score));
    }
}
