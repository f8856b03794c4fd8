//! Visit record store.
//!
//! Holds the current visit list and remembers whether it was computed from
//! raw fixes or loaded from a hand-edited file. There is no merging between
//! the two: regenerating replaces everything, and loading edits takes the
//! edited times as they are.

use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};

use crate::timeutils::{parse_time_ms, to_local};
use crate::{DwellError, MalformedRecord, Result, VisitInterval};

/// Where the visits in a store came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StoreOrigin {
    Empty,
    /// Segmented from raw fixes.
    Computed,
    /// Loaded from persisted records, treated as ground truth.
    Edited,
}

/// One persisted visit row, exactly as read.
///
/// Only `start_time`/`end_time` (or the epoch columns when the text is blank)
/// matter; everything else is informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(default)]
    pub visit_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_epoch_ms: Option<String>,
    #[serde(default)]
    pub end_epoch_ms: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

impl VisitRecord {
    /// Record with only the two time columns set.
    pub fn from_times(start_time: &str, end_time: &str) -> Self {
        Self {
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            ..Self::default()
        }
    }
}

/// Storage for the visit list.
#[derive(Debug, Clone)]
pub struct VisitStore {
    visits: Vec<VisitInterval>,
    origin: StoreOrigin,
}

impl Default for VisitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            visits: Vec::new(),
            origin: StoreOrigin::Empty,
        }
    }

    pub fn visits(&self) -> &[VisitInterval] {
        &self.visits
    }

    pub fn origin(&self) -> StoreOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn into_visits(self) -> Vec<VisitInterval> {
        self.visits
    }

    /// Replace everything with freshly computed visits.
    ///
    /// Any previously loaded edits are discarded. Only call this for an
    /// explicit regenerate.
    pub fn replace_computed(&mut self, visits: Vec<VisitInterval>) -> Result<()> {
        check_ordering(&visits)?;
        if self.origin == StoreOrigin::Edited {
            info!(
                "[VisitStore] Regenerating: discarding {} edited visits",
                self.visits.len()
            );
        }
        self.visits = visits;
        self.origin = StoreOrigin::Computed;
        Ok(())
    }

    /// Load persisted, possibly hand-edited records as ground truth.
    ///
    /// Each record must have parseable start and end times, must not end
    /// before it starts, and must start no earlier than the previous record
    /// ends. All bad records are reported together; on error the store is
    /// left unchanged.
    pub fn load_edited(&mut self, records: &[VisitRecord], tz: Tz) -> Result<()> {
        let mut visits = Vec::with_capacity(records.len());
        let mut problems = Vec::new();
        let mut previous: Option<VisitInterval> = None;

        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            let visit = match parse_record(record, row, tz) {
                Ok(v) => v,
                Err(reason) => {
                    problems.push(malformed(record, row, reason));
                    continue;
                }
            };

            if let Some(prev) = previous {
                if visit.start_ms < prev.start_ms {
                    problems.push(malformed(
                        record,
                        row,
                        format!("starts before visit {} (out of order)", prev.visit_id),
                    ));
                    continue;
                }
                if visit.start_ms < prev.end_ms {
                    problems.push(malformed(
                        record,
                        row,
                        format!("overlaps visit {}", prev.visit_id),
                    ));
                    continue;
                }
            }

            previous = Some(visit);
            visits.push(visit);
        }

        if !problems.is_empty() {
            return Err(DwellError::MalformedRecords(problems));
        }

        info!("[VisitStore] Loaded {} edited visits", visits.len());
        self.visits = visits;
        self.origin = StoreOrigin::Edited;
        Ok(())
    }
}

fn malformed(record: &VisitRecord, row: usize, reason: String) -> MalformedRecord {
    MalformedRecord {
        row,
        visit_id: record
            .visit_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        reason,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_edge(
    text: &Option<String>,
    epoch: &Option<String>,
    column: &str,
    tz: Tz,
) -> std::result::Result<i64, String> {
    let ms = if let Some(t) = non_blank(text) {
        parse_time_ms(t, tz).map_err(|e| format!("{column}: {e}"))?
    } else {
        match non_blank(epoch) {
            Some(ms) => ms
                .parse::<i64>()
                .map_err(|_| format!("{column}: epoch column {ms:?} is not an integer"))?,
            None => return Err(format!("{column} is missing")),
        }
    };
    // Anything chrono cannot place on a calendar cannot be aggregated per day.
    to_local(ms, tz)
        .map_err(|_| format!("{column}: {ms} ms is outside the supported date range"))?;
    Ok(ms)
}

fn parse_record(
    record: &VisitRecord,
    row: usize,
    tz: Tz,
) -> std::result::Result<VisitInterval, String> {
    let visit_id = match non_blank(&record.visit_id) {
        Some(id) => id
            .parse::<u32>()
            .map_err(|_| format!("visit_id {id:?} is not a number"))?,
        None => row as u32,
    };

    let start = parse_edge(&record.start_time, &record.start_epoch_ms, "start_time", tz);
    let end = parse_edge(&record.end_time, &record.end_epoch_ms, "end_time", tz);
    let (start_ms, end_ms) = match (start, end) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(a), Err(b)) => return Err(format!("{a}; {b}")),
        (Err(a), _) | (_, Err(a)) => return Err(a),
    };

    if end_ms < start_ms {
        return Err("end_time is before start_time".to_string());
    }
    Ok(VisitInterval::edited(visit_id, start_ms, end_ms))
}

/// Computed visit lists must be ordered, non-overlapping and non-negative.
fn check_ordering(visits: &[VisitInterval]) -> Result<()> {
    for (i, v) in visits.iter().enumerate() {
        if v.end_ms < v.start_ms {
            return Err(DwellError::invalid(format!(
                "visit {} ends before it starts",
                v.visit_id
            )));
        }
        if i > 0 && v.start_ms < visits[i - 1].end_ms {
            return Err(DwellError::invalid(format!(
                "visit {} overlaps or precedes visit {}",
                v.visit_id,
                visits[i - 1].visit_id
            )));
        }
    }
    Ok(())
}
