//! Dwell aggregation over visit lists.
//!
//! Works the same on freshly computed and hand-edited visits. Totals and the
//! per-day breakdown both clip through [`TimeSpan::overlap_ms`], so summing
//! the per-day map always gives the total.
//!
//! Day boundaries are local midnights in the caller's time zone; a visit
//! crossing midnight contributes to every day it touches.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::debug;
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::timeutils::{day_span, days_between, local_date};
use crate::{DwellError, RangeFilter, Result, TimeSpan, VisitInterval};

/// Aggregated dwell statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellSummary {
    /// The range the caller asked for, if any.
    pub range: Option<RangeFilter>,
    /// The span the statistics cover: the range, or the visits' own span.
    pub span: TimeSpan,
    /// Sum of clipped visit durations.
    pub total_ms: i64,
    /// Local calendar days covered by `span`.
    pub day_count: usize,
    pub average_per_day_ms: f64,
    /// Clipped duration per local day, every day of `span` present.
    pub per_day: BTreeMap<NaiveDate, i64>,
    /// Visits that contributed (those touching the range), unclipped.
    pub visits: Vec<VisitInterval>,
}

impl DwellSummary {
    pub fn total_seconds(&self) -> f64 {
        self.total_ms as f64 / 1000.0
    }

    pub fn average_per_day_seconds(&self) -> f64 {
        self.average_per_day_ms / 1000.0
    }

    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }
}

/// Aggregate dwell time, optionally clipped to `range`.
///
/// Without a range every visit counts in full and the average is taken over
/// the days from the first visit start to the last visit end. An empty visit
/// list without a range is an `EmptyRange` error; with a range it is a valid
/// zero total.
pub fn aggregate(
    visits: &[VisitInterval],
    range: Option<&RangeFilter>,
    tz: Tz,
) -> Result<DwellSummary> {
    for v in visits {
        if v.end_ms < v.start_ms {
            return Err(DwellError::invalid(format!(
                "visit {} ends before it starts",
                v.visit_id
            )));
        }
    }

    let (span, first_day, last_day) = match range {
        Some(r) => (
            r.span(),
            local_date(r.start_ms(), tz)?,
            local_date(r.end_ms() - 1, tz)?,
        ),
        None => {
            let start = visits.iter().map(|v| v.start_ms).min();
            let end = visits.iter().map(|v| v.end_ms).max();
            let (Some(start), Some(end)) = (start, end) else {
                return Err(DwellError::empty_range(
                    "no visits to aggregate and no range given",
                ));
            };
            let last_instant = if end > start { end - 1 } else { start };
            (
                TimeSpan::new(start, end),
                local_date(start, tz)?,
                local_date(last_instant, tz)?,
            )
        }
    };

    let days = days_between(first_day, last_day);
    if days.is_empty() {
        return Err(DwellError::empty_range(format!(
            "range covers no days ({first_day} .. {last_day})"
        )));
    }

    let mut per_day: BTreeMap<NaiveDate, i64> = days.iter().map(|d| (*d, 0)).collect();
    let mut total_ms = 0;
    let mut used = Vec::new();

    for visit in visits {
        let clipped = match range {
            Some(r) => {
                if !r.touches(&visit.span()) {
                    continue;
                }
                visit.span().intersection(&r.span())
            }
            None => Some(visit.span()).filter(|s| !s.is_empty()),
        };
        used.push(*visit);

        let Some(clipped) = clipped else {
            continue;
        };
        total_ms += clipped.len_ms();
        for (day, ms) in split_by_local_day(&clipped, tz)? {
            *per_day.entry(day).or_insert(0) += ms;
        }
    }

    let day_count = days.len();
    debug!(
        "[Aggregate] {} of {} visits, {} ms over {} days",
        used.len(),
        visits.len(),
        total_ms,
        day_count
    );

    Ok(DwellSummary {
        range: range.copied(),
        span,
        total_ms,
        day_count,
        average_per_day_ms: total_ms as f64 / day_count as f64,
        per_day,
        visits: used,
    })
}

/// Split a span at local midnights, returning the milliseconds on each day.
pub fn split_by_local_day(span: &TimeSpan, tz: Tz) -> Result<Vec<(NaiveDate, i64)>> {
    if span.is_empty() {
        return Ok(Vec::new());
    }
    let first = local_date(span.start_ms, tz)?;
    let last = local_date(span.end_ms - 1, tz)?;

    days_between(first, last)
        .into_iter()
        .map(|day| Ok((day, span.overlap_ms(&day_span(day, tz)?))))
        .filter(|piece| !matches!(piece, Ok((_, 0))))
        .collect()
}

/// Aggregate the same visits over several ranges in parallel.
#[cfg(feature = "parallel")]
pub fn aggregate_ranges(
    visits: &[VisitInterval],
    ranges: &[RangeFilter],
    tz: Tz,
) -> Vec<Result<DwellSummary>> {
    ranges
        .par_iter()
        .map(|r| aggregate(visits, Some(r), tz))
        .collect()
}
