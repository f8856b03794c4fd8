//! Visit segmentation state machine.
//!
//! Walks a normalized track once and emits raw visits. The running state is
//! an explicit [`TrackerState`] value threaded through a fold; each step
//! returns the next state and at most one finished visit.
//!
//! Policies applied per fix:
//! - in-fence fixes more than `max_gap_seconds` apart never share a visit
//! - a visit only ends after `exit_grace_seconds` of continuous absence
//! - a visit always ends at its last in-fence fix, never at an outside one
//!
//! Edges are raw sample times here; see [`crate::refine`] for the
//! entry/exit estimate.

use log::{debug, info};

use crate::normalize::check_normalized;
use crate::{EdgeKind, Fence, Fix, Provenance, Result, VisitConfig, VisitInterval};

/// A visit as found by the state machine, in fix indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVisit {
    pub start_index: usize,
    pub end_index: usize,
    pub point_count: usize,
    pub start_edge: EdgeKind,
    pub end_edge: EdgeKind,
}

/// A visit that has not been closed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenVisit {
    pub start_index: usize,
    pub start_edge: EdgeKind,
    pub last_inside_index: usize,
    pub point_count: usize,
    /// First fix of the current uninterrupted out-of-fence run, if any.
    pub outside_run_start: Option<usize>,
}

impl OpenVisit {
    fn open(index: usize, start_edge: EdgeKind) -> Self {
        Self {
            start_index: index,
            start_edge,
            last_inside_index: index,
            point_count: 1,
            outside_run_start: None,
        }
    }

    fn close(&self, end_edge: EdgeKind) -> RawVisit {
        RawVisit {
            start_index: self.start_index,
            end_index: self.last_inside_index,
            point_count: self.point_count,
            start_edge: self.start_edge,
            end_edge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Outside,
    Inside(OpenVisit),
}

/// Thresholds converted to milliseconds once per run.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_gap_ms: f64,
    exit_grace_ms: f64,
}

impl TrackerState {
    /// Consume the fix at `index` and return the next state plus any visit it closed.
    fn advance(
        self,
        index: usize,
        inside: bool,
        fixes: &[Fix],
        limits: &Limits,
    ) -> (TrackerState, Option<RawVisit>) {
        let now = fixes[index].time_ms;
        match (self, inside) {
            (TrackerState::Outside, false) => (TrackerState::Outside, None),
            (TrackerState::Outside, true) => {
                let edge = if index == 0 {
                    EdgeKind::TrackStart
                } else {
                    EdgeKind::Entry
                };
                (TrackerState::Inside(OpenVisit::open(index, edge)), None)
            }
            (TrackerState::Inside(open), true) => {
                let gap_ms = (now - fixes[open.last_inside_index].time_ms) as f64;
                if gap_ms > limits.max_gap_ms {
                    debug!(
                        "[Segmentation] Splitting at fix {}: {:.0}s since last in-fence fix",
                        index,
                        gap_ms / 1000.0
                    );
                    let closed = open.close(EdgeKind::GapSplit);
                    let reopened = OpenVisit::open(index, EdgeKind::GapSplit);
                    (TrackerState::Inside(reopened), Some(closed))
                } else {
                    let extended = OpenVisit {
                        last_inside_index: index,
                        point_count: open.point_count + 1,
                        outside_run_start: None,
                        ..open
                    };
                    (TrackerState::Inside(extended), None)
                }
            }
            (TrackerState::Inside(open), false) => {
                let run_start = open.outside_run_start.unwrap_or(index);
                let outside_ms = (now - fixes[run_start].time_ms) as f64;
                if outside_ms >= limits.exit_grace_ms {
                    debug!(
                        "[Segmentation] Exit confirmed at fix {} after {:.0}s outside",
                        index,
                        outside_ms / 1000.0
                    );
                    (TrackerState::Outside, Some(open.close(EdgeKind::Exit)))
                } else {
                    let pending = OpenVisit {
                        outside_run_start: Some(run_start),
                        ..open
                    };
                    (TrackerState::Inside(pending), None)
                }
            }
        }
    }

    /// Close whatever is open at the end of the track.
    fn finish(self) -> Option<RawVisit> {
        match self {
            TrackerState::Outside => None,
            TrackerState::Inside(open) => Some(open.close(EdgeKind::TrackEnd)),
        }
    }
}

/// Run the state machine and return visits as fix-index ranges.
///
/// Fails with `InvalidInput` on bad thresholds, a bad fence, non-finite
/// coordinates or fixes that are not strictly time-ordered.
pub fn segment_raw(fixes: &[Fix], fence: &Fence, config: &VisitConfig) -> Result<Vec<RawVisit>> {
    config.validate()?;
    fence.validate()?;
    check_normalized(fixes)?;

    let limits = Limits {
        max_gap_ms: config.max_gap_ms(),
        exit_grace_ms: config.exit_grace_ms(),
    };

    let (state, mut visits) = fixes.iter().enumerate().fold(
        (TrackerState::Outside, Vec::new()),
        |(state, mut visits), (index, fix)| {
            let inside = fence.contains(&fix.point());
            let (next, closed) = state.advance(index, inside, fixes, &limits);
            visits.extend(closed);
            (next, visits)
        },
    );
    visits.extend(state.finish());

    Ok(visits)
}

/// Segment a normalized track into visits with raw sample-time edges.
///
/// Zero-duration visits (a single in-fence fix) are kept; use
/// [`crate::filter_min_dwell`] to drop short stays.
pub fn segment_fixes(
    fixes: &[Fix],
    fence: &Fence,
    config: &VisitConfig,
) -> Result<Vec<VisitInterval>> {
    let raw = segment_raw(fixes, fence, config)?;

    info!(
        "[Segmentation] {} fixes -> {} visits",
        fixes.len(),
        raw.len()
    );

    Ok(raw
        .iter()
        .enumerate()
        .map(|(i, r)| VisitInterval {
            visit_id: i as u32 + 1,
            start_ms: fixes[r.start_index].time_ms,
            end_ms: fixes[r.end_index].time_ms,
            provenance: Some(Provenance {
                start_index: r.start_index,
                end_index: r.end_index,
                point_count: r.point_count,
                start_edge: r.start_edge,
                end_edge: r.end_edge,
                start_interpolated: false,
                end_interpolated: false,
            }),
        })
        .collect())
}
