//! Time zone parsing, local-day arithmetic and display formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::{DwellError, Result, TimeSpan};

/// Time zone used when none is given.
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// Display format for local times, e.g. `2025-12-01 23:00:00+08:00`.
const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse an IANA time zone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| DwellError::UnknownTimezone(name.to_string()))
}

/// Parse user-entered date/time text.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS[.fff]]` with a space or `T` separator, an
/// optional UTC offset (`+08:00`, `+0800`, `Z`), or a bare date meaning local
/// midnight. Text without an offset is local time in `tz`.
pub fn parse_datetime(text: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let normalized = normalize_datetime_text(text);
    let invalid = |reason: &str| DwellError::InvalidTime {
        input: text.to_string(),
        reason: reason.to_string(),
    };

    if normalized.is_empty() {
        return Err(invalid("empty value"));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Ok(dt.with_timezone(&tz));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| invalid("expected a time like 2025-12-18 09:30:00"))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| invalid("local time does not exist in this time zone"))
}

/// Parse a time given either as date/time text or as integer epoch milliseconds.
pub fn parse_time_ms(text: &str, tz: Tz) -> Result<i64> {
    let trimmed = text.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<i64>().map_err(|e| DwellError::InvalidTime {
            input: text.to_string(),
            reason: e.to_string(),
        });
    }
    parse_datetime(trimmed, tz).map(|dt| dt.timestamp_millis())
}

fn normalize_datetime_text(text: &str) -> String {
    let mut s = text.trim().replacen('T', " ", 1);
    if let Some(stripped) = s.strip_suffix('Z') {
        s = format!("{stripped}+00:00");
    }
    s
}

/// Convert epoch milliseconds to a local date/time.
pub fn to_local(ms: i64, tz: Tz) -> Result<DateTime<Tz>> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&tz))
        .ok_or_else(|| DwellError::invalid(format!("timestamp {ms} ms is out of range")))
}

/// Format epoch milliseconds as local time with offset.
pub fn format_local(ms: i64, tz: Tz) -> Result<String> {
    Ok(to_local(ms, tz)?.format(LOCAL_FORMAT).to_string())
}

/// Local calendar date of an instant.
pub fn local_date(ms: i64, tz: Tz) -> Result<NaiveDate> {
    Ok(to_local(ms, tz)?.date_naive())
}

/// Epoch milliseconds of the first instant of a local day.
///
/// Where midnight is skipped by a DST change, the day starts at the first
/// local time that exists.
pub fn day_start_ms(date: NaiveDate, tz: Tz) -> Result<i64> {
    let mut local = date.and_time(NaiveTime::MIN);
    // DST gaps are at most a few hours; step forward in 15 minute increments.
    for _ in 0..=16 {
        if let Some(dt) = tz.from_local_datetime(&local).earliest() {
            return Ok(dt.timestamp_millis());
        }
        local += TimeDelta::minutes(15);
    }
    Err(DwellError::invalid(format!(
        "cannot resolve start of day {date} in {tz}"
    )))
}

/// The half-open span covering one local calendar day.
pub fn day_span(date: NaiveDate, tz: Tz) -> Result<TimeSpan> {
    let next = date
        .succ_opt()
        .ok_or_else(|| DwellError::invalid(format!("no day after {date}")))?;
    Ok(TimeSpan::new(day_start_ms(date, tz)?, day_start_ms(next, tz)?))
}

/// Every local date from `first` to `last` inclusive.
pub fn days_between(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    first.iter_days().take_while(|d| *d <= last).collect()
}

/// Format seconds as `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_hhmmss(seconds: f64) -> String {
    let s = seconds.round().max(0.0) as i64;
    let h = s / 3600;
    let m = (s % 3600) / 60;
    let sec = s % 60;
    format!("{h:02}:{m:02}:{sec:02}")
}
