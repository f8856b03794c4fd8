//! Track inspection: time span, sampling intervals, coordinate bounds.
//!
//! Useful before picking thresholds: the p95 sampling interval says a lot
//! about sensible `exit_grace_seconds` and `transition_gap_seconds` values.

use serde::Serialize;

use crate::{Bounds, Fix, GpsPoint};

/// Sampling-interval statistics in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaStats {
    pub count: usize,
    pub min_s: f64,
    pub median_s: f64,
    pub p95_s: f64,
    pub max_s: f64,
}

/// Summary of a track as loaded (before normalization).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInspection {
    pub fix_count: usize,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
    pub delta: Option<DeltaStats>,
    pub bounds: Option<Bounds>,
    /// Fixes sharing a timestamp with an earlier fix.
    pub duplicate_times: usize,
}

/// Compute sampling-interval statistics from ascending epoch milliseconds.
///
/// Returns `None` with fewer than two samples.
pub fn delta_stats(sorted_ms: &[i64]) -> Option<DeltaStats> {
    let mut deltas: Vec<f64> = sorted_ms
        .windows(2)
        .filter(|w| w[1] >= w[0])
        .map(|w| (w[1] - w[0]) as f64 / 1000.0)
        .collect();
    if deltas.is_empty() {
        return None;
    }
    deltas.sort_by(|a, b| a.total_cmp(b));

    let n = deltas.len();
    let median = if n % 2 == 1 {
        deltas[n / 2]
    } else {
        0.5 * (deltas[n / 2 - 1] + deltas[n / 2])
    };
    let p95 = deltas[(0.95 * (n - 1) as f64) as usize];

    Some(DeltaStats {
        count: n,
        min_s: deltas[0],
        median_s: median,
        p95_s: p95,
        max_s: deltas[n - 1],
    })
}

/// Inspect fixes in any order.
pub fn inspect_fixes(fixes: &[Fix]) -> TrackInspection {
    let mut times: Vec<i64> = fixes.iter().map(|f| f.time_ms).collect();
    times.sort_unstable();

    let duplicate_times = times.windows(2).filter(|w| w[0] == w[1]).count();
    let points: Vec<GpsPoint> = fixes
        .iter()
        .map(|f| f.point())
        .filter(|p| p.is_valid())
        .collect();

    TrackInspection {
        fix_count: fixes.len(),
        first_ms: times.first().copied(),
        last_ms: times.last().copied(),
        delta: delta_stats(&times),
        bounds: Bounds::from_points(&points),
        duplicate_times,
    }
}
