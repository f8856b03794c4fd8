//! Entry/exit boundary refinement.
//!
//! A visit found by segmentation starts at its first in-fence sample and ends
//! at its last one, so the true crossing lies somewhere between that sample
//! and its out-of-fence neighbour. When the two samples are close in time the
//! crossing is estimated as the midpoint of their timestamps. This is a time
//! midpoint only; it says nothing about where the fence edge was crossed.
//!
//! Refinement reads the raw fix indices stored in each visit's provenance,
//! never the visit's current edges, so running it again gives the same
//! result. Visits without provenance (hand-edited) are returned unchanged.

use log::debug;

use crate::{DwellError, EdgeKind, Fix, Result, VisitConfig, VisitInterval};

/// Estimate a crossing instant between two sample times.
///
/// Returns the midpoint when `after_ms - before_ms <= max_gap_ms`, otherwise
/// `None` (the gap is too long for the estimate to mean anything).
pub fn crossing_estimate(before_ms: i64, after_ms: i64, max_gap_ms: f64) -> Option<i64> {
    if after_ms < before_ms {
        return None;
    }
    let gap = after_ms - before_ms;
    (gap as f64 <= max_gap_ms).then_some(before_ms + gap / 2)
}

/// Refine the edges of computed visits against the fixes they came from.
///
/// `fixes` must be the same normalized track the visits were segmented from.
/// Only real crossings are refined: a start edge of kind `Entry` against the
/// preceding out-of-fence fix, and an end edge of kind `Exit` against the
/// first fix of the confirming out-of-fence run. Gap splits and track ends
/// keep their sample times.
pub fn refine_boundaries(
    visits: &[VisitInterval],
    fixes: &[Fix],
    config: &VisitConfig,
) -> Result<Vec<VisitInterval>> {
    config.validate()?;
    let max_gap_ms = config.transition_gap_ms();

    visits
        .iter()
        .map(|visit| {
            let Some(mut prov) = visit.provenance else {
                return Ok(*visit);
            };
            if prov.start_index > prov.end_index || prov.end_index >= fixes.len() {
                return Err(DwellError::invalid(format!(
                    "visit {} refers to fixes {}..={} but the track has {} fixes",
                    visit.visit_id,
                    prov.start_index,
                    prov.end_index,
                    fixes.len()
                )));
            }

            let first_inside = fixes[prov.start_index].time_ms;
            let last_inside = fixes[prov.end_index].time_ms;

            let start = match prov.start_edge {
                EdgeKind::Entry if prov.start_index > 0 => crossing_estimate(
                    fixes[prov.start_index - 1].time_ms,
                    first_inside,
                    max_gap_ms,
                ),
                _ => None,
            };
            let end = match prov.end_edge {
                EdgeKind::Exit if prov.end_index + 1 < fixes.len() => crossing_estimate(
                    last_inside,
                    fixes[prov.end_index + 1].time_ms,
                    max_gap_ms,
                ),
                _ => None,
            };

            prov.start_interpolated = start.is_some();
            prov.end_interpolated = end.is_some();
            if start.is_some() || end.is_some() {
                debug!(
                    "[Refine] Visit {}: start {} -> {}, end {} -> {}",
                    visit.visit_id,
                    first_inside,
                    start.unwrap_or(first_inside),
                    last_inside,
                    end.unwrap_or(last_inside)
                );
            }

            Ok(VisitInterval {
                visit_id: visit.visit_id,
                start_ms: start.unwrap_or(first_inside),
                end_ms: end.unwrap_or(last_inside),
                provenance: Some(prov),
            })
        })
        .collect()
}
