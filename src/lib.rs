//! # geodwell
//!
//! Geofence visit segmentation for irregularly sampled GPS tracks.
//!
//! This library provides:
//! - Track normalization (sorting, de-duplication, point-level range clipping)
//! - A segmentation state machine that turns fixes into visit intervals
//!   (forced splits on sampling gaps, exit grace against boundary jitter)
//! - Boundary refinement that estimates entry/exit instants from the
//!   samples straddling the fence edge
//! - A visit store that reloads hand-edited visit files as ground truth
//! - Dwell aggregation clipped to arbitrary ranges, with per-day breakdown
//!
//! ## Features
//!
//! - **`parallel`** - Run independent fences or ranges in parallel with rayon
//! - **`synthetic`** - Seeded synthetic track generator for tests and benchmarks
//! - **`cli`** - The `geodwell-cli` command-line tool
//!
//! ## Quick Start
//!
//! ```rust
//! use geodwell::{detect_visits, Fence, Fix, VisitConfig};
//!
//! let fence = Fence::new(31.2304, 121.4737, 150.0);
//! let t0 = 1_735_689_600_000_i64;
//! let fixes: Vec<Fix> = (0..=30)
//!     .map(|i| Fix::new(t0 + i * 60_000, 31.2304, 121.4737))
//!     .collect();
//!
//! let visits = detect_visits(&fixes, &fence, &VisitConfig::default()).unwrap();
//! assert_eq!(visits.len(), 1);
//! assert_eq!(visits[0].duration_seconds(), 1800.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{DwellError, MalformedRecord, OptionExt, Result};

// Geographic utilities (distance, fence membership, bounds)
pub mod geo_utils;

// Half-open time spans and range filters
pub mod interval;
pub use interval::{RangeFilter, TimeSpan};

// Time zone parsing, local-day arithmetic, formatting
pub mod timeutils;

// Input cleanup before segmentation
pub mod normalize;
pub use normalize::{NormalizeReport, clip_fixes, normalize_fixes};

// Segmentation state machine
pub mod segmentation;
pub use segmentation::segment_fixes;

// Entry/exit boundary refinement
pub mod refine;
pub use refine::refine_boundaries;

// Combined segmentation + refinement entry points
pub mod detector;
#[cfg(feature = "parallel")]
pub use detector::detect_visits_for_fences;
pub use detector::{VisitDetector, detect_visits, filter_min_dwell};

// Persisted, human-editable visit list
pub mod store;
pub use store::{StoreOrigin, VisitRecord, VisitStore};

// Dwell aggregation
pub mod aggregate;
#[cfg(feature = "parallel")]
pub use aggregate::aggregate_ranges;
pub use aggregate::{DwellSummary, aggregate};

// Track inspection
pub mod inspect;
pub use inspect::{DeltaStats, TrackInspection, inspect_fixes};

// CSV input/output
pub mod io;
pub use io::{ConfigOverrides, CsvSummary, RunConfig};

// Synthetic tracks for tests and benchmarks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A coordinate in decimal degrees.
///
/// # Example
/// ```
/// use geodwell::GpsPoint;
/// let point = GpsPoint::new(31.2304, 121.4737); // Shanghai
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One normalized location sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Unix epoch milliseconds
    pub time_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Fix {
    pub fn new(time_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            time_ms,
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A circular geofence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fence {
    pub center: GpsPoint,
    /// Radius in meters, must be positive.
    pub radius_m: f64,
}

impl Fence {
    pub fn new(center_lat: f64, center_lon: f64, radius_m: f64) -> Self {
        Self {
            center: GpsPoint::new(center_lat, center_lon),
            radius_m,
        }
    }

    /// Reject non-finite centers and non-positive radii.
    pub fn validate(&self) -> Result<()> {
        if !self.center.is_valid() {
            return Err(DwellError::invalid(format!(
                "fence center ({}, {}) is not a valid coordinate",
                self.center.latitude, self.center.longitude
            )));
        }
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(DwellError::invalid(format!(
                "fence radius must be a positive number of meters, got {}",
                self.radius_m
            )));
        }
        Ok(())
    }

    /// Whether the point lies inside the fence (boundary counts as inside).
    pub fn contains(&self, point: &GpsPoint) -> bool {
        geo_utils::is_inside(self, point)
    }
}

/// Thresholds for one segmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitConfig {
    /// Largest gap between two consecutive in-fence fixes that is still
    /// treated as continuous presence. Larger gaps force a split.
    /// Default: 43200.0 (12 hours)
    pub max_gap_seconds: f64,

    /// Continuous out-of-fence time required before a visit is closed.
    /// Shorter excursions are treated as boundary jitter.
    /// Default: 300.0 (5 minutes)
    pub exit_grace_seconds: f64,

    /// Largest gap across the fence edge for which the crossing instant is
    /// estimated as the midpoint of the two straddling samples.
    /// Default: 600.0 (10 minutes)
    pub transition_gap_seconds: f64,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            max_gap_seconds: 12.0 * 60.0 * 60.0,
            exit_grace_seconds: 5.0 * 60.0,
            transition_gap_seconds: 10.0 * 60.0,
        }
    }
}

impl VisitConfig {
    /// Every threshold must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_gap_seconds", self.max_gap_seconds),
            ("exit_grace_seconds", self.exit_grace_seconds),
            ("transition_gap_seconds", self.transition_gap_seconds),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(DwellError::invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn max_gap_ms(&self) -> f64 {
        self.max_gap_seconds * 1000.0
    }

    pub(crate) fn exit_grace_ms(&self) -> f64 {
        self.exit_grace_seconds * 1000.0
    }

    pub(crate) fn transition_gap_ms(&self) -> f64 {
        self.transition_gap_seconds * 1000.0
    }
}

// ============================================================================
// Visit Types
// ============================================================================

/// How one edge of a computed visit came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// The track began inside the fence.
    TrackStart,
    /// An in-fence fix followed an out-of-fence one.
    Entry,
    /// The gap between two in-fence fixes exceeded `max_gap_seconds`.
    GapSplit,
    /// The out-of-fence run reached `exit_grace_seconds`.
    Exit,
    /// The track ended while inside.
    TrackEnd,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::TrackStart => "track_start",
            EdgeKind::Entry => "entry",
            EdgeKind::GapSplit => "gap_split",
            EdgeKind::Exit => "exit",
            EdgeKind::TrackEnd => "track_end",
        }
    }
}

/// Where a computed visit came from in the raw fix sequence.
///
/// Edited visits have no provenance; the refiner leaves them alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Index of the first in-fence fix of the visit.
    pub start_index: usize,
    /// Index of the last in-fence fix of the visit.
    pub end_index: usize,
    /// In-fence fixes that belong to the visit.
    pub point_count: usize,
    pub start_edge: EdgeKind,
    pub end_edge: EdgeKind,
    /// Start was moved to the midpoint of the straddling samples.
    pub start_interpolated: bool,
    /// End was moved to the midpoint of the straddling samples.
    pub end_interpolated: bool,
}

impl Provenance {
    /// Short label describing how both edges were produced, e.g. `entry~:exit`.
    pub fn method(&self) -> String {
        let mark = |interpolated: bool| if interpolated { "~" } else { "" };
        format!(
            "{}{}:{}{}",
            self.start_edge.as_str(),
            mark(self.start_interpolated),
            self.end_edge.as_str(),
            mark(self.end_interpolated)
        )
    }
}

/// A continuous stay inside the fence.
///
/// The duration is always derived from the two edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisitInterval {
    pub visit_id: u32,
    /// Unix epoch milliseconds
    pub start_ms: i64,
    /// Unix epoch milliseconds, never before `start_ms`
    pub end_ms: i64,
    /// Present for computed visits, absent for hand-edited ones.
    pub provenance: Option<Provenance>,
}

impl VisitInterval {
    /// Create an interval with no provenance (as loaded from an edited file).
    pub fn edited(visit_id: u32, start_ms: i64, end_ms: i64) -> Self {
        Self {
            visit_id,
            start_ms,
            end_ms,
            provenance: None,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms).max(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_ms, self.end_ms)
    }

    pub fn is_edited(&self) -> bool {
        self.provenance.is_none()
    }

    /// Method label for persistence.
    pub fn method(&self) -> String {
        self.provenance
            .map(|p| p.method())
            .unwrap_or_else(|| "edited".to_string())
    }
}
