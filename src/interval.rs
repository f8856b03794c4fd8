//! Half-open time spans `[start, end)` in epoch milliseconds.
//!
//! All clipping in the crate goes through [`TimeSpan::overlap_ms`], so range
//! totals and per-day breakdowns agree to the millisecond.

use serde::{Deserialize, Serialize};

use crate::{DwellError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeSpan {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn len_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.end_ms <= self.start_ms
    }

    pub fn contains(&self, t_ms: i64) -> bool {
        t_ms >= self.start_ms && t_ms < self.end_ms
    }

    /// Intersection of two spans, `None` when they share no time.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let start = self.start_ms.max(other.start_ms);
        let end = self.end_ms.min(other.end_ms);
        (end > start).then_some(TimeSpan::new(start, end))
    }

    /// Length of the intersection, zero when disjoint.
    pub fn overlap_ms(&self, other: &TimeSpan) -> i64 {
        self.intersection(other).map_or(0, |s| s.len_ms())
    }
}

/// A caller-supplied aggregation or clipping window, half-open `[start, end)`.
///
/// A window whose end is not after its start spans zero days and is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    span: TimeSpan,
}

impl RangeFilter {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(DwellError::empty_range(format!(
                "range end {end_ms} is not after range start {start_ms}"
            )));
        }
        Ok(Self {
            span: TimeSpan::new(start_ms, end_ms),
        })
    }

    pub fn start_ms(&self) -> i64 {
        self.span.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.span.end_ms
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn contains(&self, t_ms: i64) -> bool {
        self.span.contains(t_ms)
    }

    /// Clipped length of `span` inside this range.
    pub fn clip_ms(&self, span: &TimeSpan) -> i64 {
        self.span.overlap_ms(span)
    }

    /// Whether a span shares time with the range. A zero-length span counts
    /// when its instant falls inside the range.
    pub fn touches(&self, span: &TimeSpan) -> bool {
        if span.is_empty() {
            self.contains(span.start_ms)
        } else {
            self.span.intersection(span).is_some()
        }
    }
}
