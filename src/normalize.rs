//! Track normalization.
//!
//! Segmentation requires fixes with valid coordinates in strictly increasing
//! time order. Raw exports rarely satisfy that, so this module:
//! - drops fixes with non-finite or out-of-range coordinates
//! - sorts by time (stable, so the first of equal timestamps wins)
//! - drops duplicate timestamps
//!
//! It also provides point-level range clipping.

use log::warn;
use serde::Serialize;

use crate::{DwellError, Fix, RangeFilter, Result};

/// What normalization did to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NormalizeReport {
    pub input: usize,
    pub kept: usize,
    pub dropped_invalid: usize,
    pub dropped_duplicates: usize,
    /// Whether the input was already in non-decreasing time order.
    pub was_sorted: bool,
}

/// Clean a raw fix list into a segmentable track.
pub fn normalize_fixes(mut fixes: Vec<Fix>) -> (Vec<Fix>, NormalizeReport) {
    let input = fixes.len();

    fixes.retain(|f| f.point().is_valid());
    let dropped_invalid = input - fixes.len();

    let was_sorted = fixes.windows(2).all(|w| w[0].time_ms <= w[1].time_ms);
    if !was_sorted {
        fixes.sort_by_key(|f| f.time_ms);
    }

    let before_dedup = fixes.len();
    fixes.dedup_by_key(|f| f.time_ms);
    let dropped_duplicates = before_dedup - fixes.len();

    if dropped_invalid > 0 || dropped_duplicates > 0 {
        warn!(
            "[Normalize] Dropped {} invalid and {} duplicate-time fixes out of {}",
            dropped_invalid, dropped_duplicates, input
        );
    }

    let report = NormalizeReport {
        input,
        kept: fixes.len(),
        dropped_invalid,
        dropped_duplicates,
        was_sorted,
    };
    (fixes, report)
}

/// Check that a track is ready for segmentation.
///
/// Fails on the first fix with non-finite coordinates or a time that does not
/// strictly increase.
pub fn check_normalized(fixes: &[Fix]) -> Result<()> {
    for (i, fix) in fixes.iter().enumerate() {
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            return Err(DwellError::invalid(format!(
                "fix {i} has non-finite coordinates ({}, {})",
                fix.latitude, fix.longitude
            )));
        }
        if i > 0 && fix.time_ms <= fixes[i - 1].time_ms {
            return Err(DwellError::invalid(format!(
                "fixes are not strictly time-ordered: fix {} at {} ms follows {} ms",
                i,
                fix.time_ms,
                fixes[i - 1].time_ms
            )));
        }
    }
    Ok(())
}

/// Restrict a normalized track to the fixes inside `range` (`[start, end)`).
///
/// This is point-level clipping: segmenting the result can create a visit
/// edge at the cut that does not exist in the full track. To keep true visit
/// edges and only truncate durations, clip during aggregation instead.
pub fn clip_fixes<'a>(fixes: &'a [Fix], range: &RangeFilter) -> &'a [Fix] {
    let lo = fixes.partition_point(|f| f.time_ms < range.start_ms());
    let hi = fixes.partition_point(|f| f.time_ms < range.end_ms());
    &fixes[lo..hi.max(lo)]
}
