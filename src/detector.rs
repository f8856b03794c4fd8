//! Visit detection entry points: segmentation followed by refinement.

use log::info;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{Fence, Fix, Result, VisitConfig, VisitInterval, refine_boundaries, segment_fixes};

/// A validated fence and threshold set, reusable across tracks.
///
/// Each call to [`VisitDetector::detect`] owns its own state, so one detector
/// can be shared between threads.
#[derive(Debug, Clone, Copy)]
pub struct VisitDetector {
    fence: Fence,
    config: VisitConfig,
}

impl VisitDetector {
    pub fn new(fence: Fence, config: VisitConfig) -> Result<Self> {
        fence.validate()?;
        config.validate()?;
        Ok(Self { fence, config })
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    pub fn config(&self) -> &VisitConfig {
        &self.config
    }

    /// Segment a normalized track and refine the visit edges.
    pub fn detect(&self, fixes: &[Fix]) -> Result<Vec<VisitInterval>> {
        let raw = segment_fixes(fixes, &self.fence, &self.config)?;
        refine_boundaries(&raw, fixes, &self.config)
    }
}

/// Detect visits to one fence in a normalized track.
///
/// # Example
/// ```
/// use geodwell::{detect_visits, Fence, Fix, VisitConfig};
///
/// let fence = Fence::new(31.2304, 121.4737, 100.0);
/// let fixes = vec![
///     Fix::new(0, 31.2400, 121.4737),       // outside
///     Fix::new(60_000, 31.2304, 121.4737),  // inside
///     Fix::new(120_000, 31.2304, 121.4737), // inside
///     Fix::new(180_000, 31.2400, 121.4737), // outside
///     Fix::new(600_000, 31.2400, 121.4737), // still outside, exit confirmed
/// ];
///
/// let visits = detect_visits(&fixes, &fence, &VisitConfig::default()).unwrap();
/// assert_eq!(visits.len(), 1);
/// assert_eq!(visits[0].start_ms, 30_000);
/// assert_eq!(visits[0].end_ms, 150_000);
/// ```
pub fn detect_visits(
    fixes: &[Fix],
    fence: &Fence,
    config: &VisitConfig,
) -> Result<Vec<VisitInterval>> {
    VisitDetector::new(*fence, *config)?.detect(fixes)
}

/// Detect visits for several fences over the same track, one independent run
/// per fence. Results are in fence order.
#[cfg(feature = "parallel")]
pub fn detect_visits_for_fences(
    fixes: &[Fix],
    fences: &[Fence],
    config: &VisitConfig,
) -> Vec<Result<Vec<VisitInterval>>> {
    info!(
        "[Detector] Running {} fences over {} fixes in parallel",
        fences.len(),
        fixes.len()
    );
    fences
        .par_iter()
        .map(|fence| detect_visits(fixes, fence, config))
        .collect()
}

/// Drop visits shorter than `min_seconds` and renumber the rest from 1.
///
/// This is a reporting policy; detection itself keeps every visit.
pub fn filter_min_dwell(visits: &[VisitInterval], min_seconds: f64) -> Vec<VisitInterval> {
    let kept: Vec<VisitInterval> = visits
        .iter()
        .filter(|v| v.duration_seconds() >= min_seconds)
        .enumerate()
        .map(|(i, v)| VisitInterval {
            visit_id: i as u32 + 1,
            ..*v
        })
        .collect();
    if kept.len() < visits.len() {
        info!(
            "[Detector] Dropped {} visits shorter than {}s",
            visits.len() - kept.len(),
            min_seconds
        );
    }
    kept
}
