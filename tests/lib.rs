//! End-to-end tests through the public API

use chrono_tz::Tz;
use geodwell::*;

const T0: i64 = 1_764_547_200_000; // 2025-12-01 08:00:00+08:00
const MIN: i64 = 60_000;

const LAB: (f64, f64) = (31.2304, 121.4737);
const HOME: (f64, f64) = (31.2222, 121.4588);

fn tz() -> Tz {
    chrono_tz::Asia::Shanghai
}

fn at(place: (f64, f64), t: i64) -> Fix {
    Fix::new(t, place.0, place.1)
}

/// A day that goes home -> lab -> home -> lab, sampled unevenly.
fn commute_day() -> Vec<Fix> {
    let mut fixes = Vec::new();
    let mut t = T0;
    for (place, minutes, step) in [
        (HOME, 60, 5),
        (LAB, 240, 3),
        (HOME, 90, 7),
        (LAB, 120, 4),
        (HOME, 60, 5),
    ] {
        let end = t + minutes * MIN;
        while t < end {
            fixes.push(at(place, t));
            t += step * MIN;
        }
    }
    fixes
}

#[test]
fn test_gps_point_validation() {
    assert!(GpsPoint::new(31.0, 121.0).is_valid());
    assert!(!GpsPoint::new(91.0, 0.0).is_valid());
    assert!(!GpsPoint::new(0.0, 181.0).is_valid());
    assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
}

#[test]
fn test_visit_config_default() {
    let config = VisitConfig::default();
    assert_eq!(config.max_gap_seconds, 43_200.0);
    assert_eq!(config.exit_grace_seconds, 300.0);
    assert_eq!(config.transition_gap_seconds, 600.0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_visit_config_partial_json() {
    let config: VisitConfig = serde_json::from_str(r#"{ "max_gap_seconds": 3600 }"#).unwrap();
    assert_eq!(config.max_gap_seconds, 3600.0);
    assert_eq!(config.exit_grace_seconds, 300.0);
}

#[test]
fn test_commute_day_end_to_end() {
    let (fixes, report) = normalize_fixes(commute_day());
    assert_eq!(report.dropped_invalid + report.dropped_duplicates, 0);

    let lab = Fence::new(LAB.0, LAB.1, 200.0);
    let visits = detect_visits(&fixes, &lab, &VisitConfig::default()).unwrap();
    assert_eq!(visits.len(), 2);
    assert!(visits.iter().all(|v| v.method() == "entry~:exit~"));

    // Each stay is its sampled length plus half a step at each edge.
    assert_eq!(visits[0].start_ms, T0 + 60 * MIN - 150_000);
    assert!(visits[0].duration_ms() > 235 * MIN);
    assert!(visits[0].duration_ms() < 245 * MIN);

    let summary = aggregate(&visits, None, tz()).unwrap();
    assert_eq!(summary.day_count, 1);
    assert_eq!(
        summary.total_ms,
        visits.iter().map(|v| v.duration_ms()).sum::<i64>()
    );
}

#[test]
fn test_min_dwell_filter_renumbers() {
    let visits = vec![
        VisitInterval::edited(1, 0, 30_000),
        VisitInterval::edited(2, 60_000, 200_000),
        VisitInterval::edited(3, 300_000, 300_000),
        VisitInterval::edited(4, 400_000, 500_000),
    ];
    let kept = filter_min_dwell(&visits, 60.0);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].visit_id, 1);
    assert_eq!(kept[0].start_ms, 60_000);
    assert_eq!(kept[1].visit_id, 2);
    assert_eq!(kept[1].start_ms, 400_000);
}

#[test]
fn test_detector_reuse() {
    let detector = VisitDetector::new(
        Fence::new(HOME.0, HOME.1, 200.0),
        VisitConfig::default(),
    )
    .unwrap();
    let (fixes, _) = normalize_fixes(commute_day());

    let whole = detector.detect(&fixes).unwrap();
    assert_eq!(whole.len(), 3);
    assert_eq!(whole[0].provenance.unwrap().start_edge, EdgeKind::TrackStart);
    assert_eq!(whole[2].provenance.unwrap().end_edge, EdgeKind::TrackEnd);

    // Point-level clipping can cut a visit in two at the range edge.
    let range = RangeFilter::new(T0 + 30 * MIN, T0 + 8 * 60 * MIN).unwrap();
    let clipped = detector.detect(clip_fixes(&fixes, &range)).unwrap();
    assert_eq!(clipped.len(), 2);
    assert_eq!(clipped[0].start_ms, T0 + 30 * MIN);
}

#[test]
fn test_point_and_aggregate_clipping_agree_for_interior_visit() {
    let detector =
        VisitDetector::new(Fence::new(LAB.0, LAB.1, 200.0), VisitConfig::default()).unwrap();
    let (fixes, _) = normalize_fixes(commute_day());

    // The morning lab stay lies well inside this range; both edges are at home.
    let range = RangeFilter::new(T0 + 30 * MIN, T0 + 330 * MIN).unwrap();

    let full = detector.detect(&fixes).unwrap();
    let clipped = detector.detect(clip_fixes(&fixes, &range)).unwrap();

    let by_aggregate = aggregate(&full, Some(&range), tz()).unwrap();
    let by_points = aggregate(&clipped, Some(&range), tz()).unwrap();

    assert_eq!(by_points.visit_count(), 1);
    assert_eq!(by_aggregate.visit_count(), 1);
    assert_eq!(by_points.total_ms, by_aggregate.total_ms);
    assert_eq!(by_points.total_ms, 241 * MIN);
}

#[test]
fn test_detector_rejects_bad_fence() {
    let result = VisitDetector::new(Fence::new(0.0, 0.0, f64::NAN), VisitConfig::default());
    assert!(matches!(result, Err(DwellError::InvalidInput { .. })));
}

#[test]
fn test_edit_then_aggregate_ignores_recomputation() {
    let (fixes, _) = normalize_fixes(commute_day());
    let lab = Fence::new(LAB.0, LAB.1, 200.0);

    let mut store = VisitStore::new();
    store
        .replace_computed(detect_visits(&fixes, &lab, &VisitConfig::default()).unwrap())
        .unwrap();
    assert_eq!(store.origin(), StoreOrigin::Computed);

    store
        .load_edited(
            &[VisitRecord::from_times("2025-12-01 09:00", "2025-12-01 13:00")],
            tz(),
        )
        .unwrap();
    let summary = aggregate(store.visits(), None, tz()).unwrap();
    assert_eq!(summary.total_seconds(), 4.0 * 3600.0);
    assert_eq!(summary.visit_count(), 1);
}

#[cfg(feature = "parallel")]
#[test]
fn test_fences_in_parallel_match_sequential() {
    let (fixes, _) = normalize_fixes(commute_day());
    let fences = vec![
        Fence::new(LAB.0, LAB.1, 200.0),
        Fence::new(HOME.0, HOME.1, 200.0),
        Fence::new(LAB.0, LAB.1, -1.0),
    ];
    let config = VisitConfig::default();

    let results = detect_visits_for_fences(&fixes, &fences, &config);
    assert_eq!(results.len(), 3);
    for (result, fence) in results.iter().zip(&fences[..2]) {
        let expected = detect_visits(&fixes, fence, &config).unwrap();
        assert_eq!(result.as_ref().unwrap(), &expected);
    }
    assert!(results[2].is_err());
}
