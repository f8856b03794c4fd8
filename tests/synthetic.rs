//! Tests for the synthetic track generator
#![cfg(feature = "synthetic")]

use geodwell::synthetic::SyntheticScenario;
use geodwell::{VisitConfig, aggregate, detect_visits, normalize_fixes};

const START: i64 = 1_735_689_600_000;

#[test]
fn test_same_seed_same_track() {
    let a = SyntheticScenario::demo(START, 300, 7).generate();
    let b = SyntheticScenario::demo(START, 300, 7).generate();
    let c = SyntheticScenario::demo(START, 300, 8).generate();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_track_is_already_normalized() {
    let fixes = SyntheticScenario::demo(START, 2_000, 42).generate();
    assert_eq!(fixes.len(), 2_000);
    assert!(fixes[0].time_ms > START);

    let (normalized, report) = normalize_fixes(fixes.clone());
    assert!(report.was_sorted);
    assert_eq!(normalized, fixes);
}

#[test]
fn test_detection_on_synthetic_track() {
    let scenario = SyntheticScenario::demo(START, 5_000, 42);
    let fixes = scenario.generate();
    let fence = scenario.cluster("shanghai_lab").unwrap().fence(300.0);

    let visits = detect_visits(&fixes, &fence, &VisitConfig::default()).unwrap();
    assert!(!visits.is_empty());
    for pair in visits.windows(2) {
        assert!(pair[0].end_ms <= pair[1].start_ms);
    }

    let summary = aggregate(&visits, None, chrono_tz::Asia::Shanghai).unwrap();
    let per_day: i64 = summary.per_day.values().sum();
    assert_eq!(per_day, summary.total_ms);
}

#[test]
fn test_unknown_cluster() {
    let scenario = SyntheticScenario::demo(START, 10, 1);
    assert!(scenario.cluster("moon_base").is_none());
}
