//! CSV input/output and run configuration files.
//!
//! Track exports are read leniently: only `geoTime` (epoch ms), `latitude`
//! and `longitude` are required, other columns are ignored, and rows that do
//! not parse are skipped and counted. Visit files are written with both
//! readable local times and epoch columns; when read back, the readable
//! columns win so that hand edits take effect.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono_tz::Tz;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::timeutils::{DEFAULT_TIMEZONE, format_hhmmss, format_local, parse_timezone};
use crate::{DwellError, Fence, Fix, Result, VisitConfig, VisitInterval, VisitRecord};

const TIME_COLUMN: &str = "geoTime";
const LAT_COLUMN: &str = "latitude";
const LON_COLUMN: &str = "longitude";

/// Counts from reading a track export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvSummary {
    pub rows_total: usize,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub fieldnames: Vec<String>,
}

/// Values given on the command line; each one that is set wins over the
/// config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    pub radius_m: Option<f64>,
    pub max_gap_seconds: Option<f64>,
    pub exit_grace_seconds: Option<f64>,
    pub transition_gap_seconds: Option<f64>,
    pub min_dwell_seconds: Option<f64>,
    pub timezone: Option<String>,
}

/// Everything needed for one detection run, loadable from JSON.
///
/// ```json
/// {
///   "fence": { "center": { "latitude": 31.2304, "longitude": 121.4737 }, "radius_m": 150.0 },
///   "thresholds": { "exit_grace_seconds": 180.0 },
///   "timezone": "Asia/Shanghai",
///   "min_dwell_seconds": 60.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub fence: Fence,
    #[serde(default)]
    pub thresholds: VisitConfig,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_min_dwell")]
    pub min_dwell_seconds: f64,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_min_dwell() -> f64 {
    60.0
}

impl RunConfig {
    pub fn new(fence: Fence) -> Self {
        Self {
            fence,
            thresholds: VisitConfig::default(),
            timezone: default_timezone(),
            min_dwell_seconds: default_min_dwell(),
        }
    }

    /// Load and validate a JSON run configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build the configuration for one run: the file (if any) with every
    /// given override applied on top, validated once at the end.
    ///
    /// Without a file, the fence center and radius must all be overridden.
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::read_json(p)?,
            None => {
                let (Some(lat), Some(lon), Some(radius)) =
                    (overrides.center_lat, overrides.center_lon, overrides.radius_m)
                else {
                    return Err(DwellError::invalid(
                        "fence center latitude, longitude and radius are required without a \
                         config file",
                    ));
                };
                Self::new(Fence::new(lat, lon, radius))
            }
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Replace every field that has an override.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        let set = |field: &mut f64, value: Option<f64>| {
            if let Some(v) = value {
                *field = v;
            }
        };
        set(&mut self.fence.center.latitude, overrides.center_lat);
        set(&mut self.fence.center.longitude, overrides.center_lon);
        set(&mut self.fence.radius_m, overrides.radius_m);
        set(&mut self.thresholds.max_gap_seconds, overrides.max_gap_seconds);
        set(&mut self.thresholds.exit_grace_seconds, overrides.exit_grace_seconds);
        set(
            &mut self.thresholds.transition_gap_seconds,
            overrides.transition_gap_seconds,
        );
        set(&mut self.min_dwell_seconds, overrides.min_dwell_seconds);
        if let Some(tz) = &overrides.timezone {
            self.timezone = tz.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.fence.validate()?;
        self.thresholds.validate()?;
        self.tz()?;
        if !(self.min_dwell_seconds.is_finite() && self.min_dwell_seconds >= 0.0) {
            return Err(DwellError::invalid(format!(
                "min_dwell_seconds must be zero or positive, got {}",
                self.min_dwell_seconds
            )));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }
}

// ============================================================================
// Track CSV
// ============================================================================

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
        DwellError::invalid(format!(
            "CSV is missing required column {name:?}; found {:?}",
            headers.iter().collect::<Vec<_>>()
        ))
    })
}

fn parse_epoch_ms(text: &str) -> Option<i64> {
    let t = text.trim();
    t.parse::<i64>().ok().or_else(|| {
        t.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v as i64)
    })
}

fn parse_row(record: &csv::StringRecord, cols: (usize, usize, usize)) -> Option<Fix> {
    let time_ms = parse_epoch_ms(record.get(cols.0)?)?;
    let latitude = record.get(cols.1)?.trim().parse::<f64>().ok()?;
    let longitude = record.get(cols.2)?.trim().parse::<f64>().ok()?;
    Some(Fix::new(time_ms, latitude, longitude))
}

/// Read fixes from a track export. Rows in file order, not normalized.
pub fn read_track<R: Read>(reader: R) -> Result<(Vec<Fix>, CsvSummary)> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let cols = (
        column_index(&headers, TIME_COLUMN)?,
        column_index(&headers, LAT_COLUMN)?,
        column_index(&headers, LON_COLUMN)?,
    );

    let mut fixes = Vec::new();
    let mut rows_total = 0;
    for record in rdr.records() {
        rows_total += 1;
        match record {
            Ok(r) => fixes.extend(parse_row(&r, cols)),
            Err(e) => warn!("[CSV] Skipping unreadable row {}: {}", rows_total, e),
        }
    }

    let summary = CsvSummary {
        rows_total,
        rows_parsed: fixes.len(),
        rows_skipped: rows_total - fixes.len(),
        fieldnames: headers.iter().map(str::to_string).collect(),
    };
    if summary.rows_skipped > 0 {
        warn!(
            "[CSV] Skipped {} of {} rows that failed to parse",
            summary.rows_skipped, summary.rows_total
        );
    }
    Ok((fixes, summary))
}

pub fn read_track_csv(path: impl AsRef<Path>) -> Result<(Vec<Fix>, CsvSummary)> {
    let path = path.as_ref();
    let (fixes, summary) = read_track(BufReader::new(File::open(path)?))?;
    info!("[CSV] Read {} fixes from {}", fixes.len(), path.display());
    Ok((fixes, summary))
}

#[derive(Serialize)]
struct TrackRow {
    #[serde(rename = "geoTime")]
    geo_time: i64,
    latitude: String,
    longitude: String,
}

/// Write fixes in the track export layout (`geoTime,latitude,longitude`).
pub fn write_track<W: Write>(writer: W, fixes: &[Fix]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for f in fixes {
        wtr.serialize(TrackRow {
            geo_time: f.time_ms,
            latitude: format!("{:.7}", f.latitude),
            longitude: format!("{:.7}", f.longitude),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_track_csv(path: impl AsRef<Path>, fixes: &[Fix]) -> Result<()> {
    write_track(BufWriter::new(File::create(path)?), fixes)
}

#[derive(Serialize)]
struct ReadableRow {
    time_local: String,
    epoch_ms: i64,
    latitude: f64,
    longitude: f64,
    inside_fence: Option<bool>,
}

/// Write fixes with readable local times; `inside_fence` is filled when a
/// fence is given.
pub fn write_readable<W: Write>(
    writer: W,
    fixes: &[Fix],
    tz: Tz,
    fence: Option<&Fence>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for f in fixes {
        wtr.serialize(ReadableRow {
            time_local: format_local(f.time_ms, tz)?,
            epoch_ms: f.time_ms,
            latitude: f.latitude,
            longitude: f.longitude,
            inside_fence: fence.map(|fence| fence.contains(&f.point())),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_readable_csv(
    path: impl AsRef<Path>,
    fixes: &[Fix],
    tz: Tz,
    fence: Option<&Fence>,
) -> Result<()> {
    write_readable(BufWriter::new(File::create(path)?), fixes, tz, fence)
}

// ============================================================================
// Visits CSV
// ============================================================================

#[derive(Serialize)]
struct VisitRow {
    visit_id: u32,
    start_time: String,
    end_time: String,
    duration_seconds: String,
    duration_hhmmss: String,
    points: Option<usize>,
    start_epoch_ms: i64,
    end_epoch_ms: i64,
    method: String,
}

/// Write visits for manual editing.
pub fn write_visits<W: Write>(writer: W, visits: &[VisitInterval], tz: Tz) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for v in visits {
        wtr.serialize(VisitRow {
            visit_id: v.visit_id,
            start_time: format_local(v.start_ms, tz)?,
            end_time: format_local(v.end_ms, tz)?,
            duration_seconds: format!("{:.3}", v.duration_seconds()),
            duration_hhmmss: format_hhmmss(v.duration_seconds()),
            points: v.provenance.map(|p| p.point_count),
            start_epoch_ms: v.start_ms,
            end_epoch_ms: v.end_ms,
            method: v.method(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_visits_csv(path: impl AsRef<Path>, visits: &[VisitInterval], tz: Tz) -> Result<()> {
    let path = path.as_ref();
    write_visits(BufWriter::new(File::create(path)?), visits, tz)?;
    info!("[CSV] Wrote {} visits to {}", visits.len(), path.display());
    Ok(())
}

/// Read persisted visit rows without interpreting them.
///
/// Validation happens in [`crate::VisitStore::load_edited`] so that every bad
/// row can be reported at once.
pub fn read_visit_records<R: Read>(reader: R) -> Result<Vec<VisitRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn read_visit_records_csv(path: impl AsRef<Path>) -> Result<Vec<VisitRecord>> {
    read_visit_records(BufReader::new(File::open(path)?))
}
