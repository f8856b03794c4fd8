//! Unified error handling for geodwell.
//!
//! Every rejected input maps to a distinct variant so callers can tell an
//! invalid run apart from an empty range or a hand-edited file that needs
//! fixing.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DwellError>;

/// One persisted visit row that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// 1-based data row in the persisted file (header excluded).
    pub row: usize,
    /// Visit id as written in the file, if the row had one.
    pub visit_id: Option<String>,
    /// Why the row was rejected.
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.visit_id {
            Some(id) => write!(f, "row {} (visit {}): {}", self.row, id, self.reason),
            None => write!(f, "row {}: {}", self.row, self.reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum DwellError {
    /// Unsorted fixes, bad thresholds, non-finite coordinates, bad radius.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The requested range covers zero days, or there is nothing to aggregate.
    #[error("empty range: {reason}")]
    EmptyRange { reason: String },

    /// Persisted visits that failed validation, all of them at once.
    #[error("{} malformed visit record(s): {}", .0.len(), join_records(.0))]
    MalformedRecords(Vec<MalformedRecord>),

    #[error("cannot parse time {input:?}: {reason}")]
    InvalidTime { input: String, reason: String },

    #[error("unknown timezone {0:?} (expected an IANA name such as Asia/Shanghai)")]
    UnknownTimezone(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DwellError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        DwellError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn empty_range(reason: impl Into<String>) -> Self {
        DwellError::EmptyRange {
            reason: reason.into(),
        }
    }
}

fn join_records(records: &[MalformedRecord]) -> String {
    records
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convert a missing value into an [`DwellError::InvalidInput`].
pub trait OptionExt<T> {
    fn ok_or_invalid(self, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid(self, reason: &str) -> Result<T> {
        self.ok_or_else(|| DwellError::invalid(reason))
    }
}
