//! geodwell CLI - geofence visits from exported GPS tracks
//!
//! Usage:
//!   geodwell-cli inspect --csv <path> [--json]
//!   geodwell-cli export-readable --csv <path> --out <path>
//!   geodwell-cli find-visits --csv <path> --center-lat <lat> --center-lon <lon> --radius-m <m>
//!   geodwell-cli sum-visits --visits <path> [--range-start <time>] [--range-end <time>]
//!
//! `find-visits` writes a visits CSV that can be edited by hand;
//! `sum-visits` reads it back and treats the edited times as ground truth.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use log::info;

use geodwell::io::{
    read_track_csv, read_visit_records_csv, write_readable_csv, write_visits_csv,
};
use geodwell::timeutils::{
    DEFAULT_TIMEZONE, format_hhmmss, format_local, parse_time_ms, parse_timezone,
};
use geodwell::{
    ConfigOverrides, DwellError, Fence, Fix, OptionExt, RangeFilter, Result, RunConfig, TimeSpan,
    VisitDetector, VisitStore, aggregate, clip_fixes, filter_min_dwell, inspect_fixes,
    normalize_fixes,
};

#[derive(Parser)]
#[command(name = "geodwell-cli")]
#[command(about = "Find geofence visits in GPS tracks and sum dwell time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// IANA time zone for reading and printing local times [default: Asia/Shanghai].
    /// Overrides the `timezone` of a `--config` file.
    #[arg(long, global = true)]
    tz: Option<String>,
}

/// Fence and threshold flags for `find-visits`; each one given overrides the config file.
#[derive(Args, Debug, Default)]
struct OverrideArgs {
    #[arg(long)]
    center_lat: Option<f64>,
    #[arg(long)]
    center_lon: Option<f64>,
    #[arg(long)]
    radius_m: Option<f64>,

    /// Force a split when in-fence fixes are further apart than this
    #[arg(long)]
    max_gap_seconds: Option<f64>,

    /// Continuous time outside before a visit ends
    #[arg(long)]
    exit_grace_seconds: Option<f64>,

    /// Largest boundary gap that still gets a midpoint estimate
    #[arg(long)]
    transition_gap_seconds: Option<f64>,

    /// Leave out visits shorter than this from the output
    #[arg(long)]
    min_dwell_seconds: Option<f64>,
}

impl OverrideArgs {
    fn into_overrides(self, timezone: Option<String>) -> ConfigOverrides {
        ConfigOverrides {
            center_lat: self.center_lat,
            center_lon: self.center_lon,
            radius_m: self.radius_m,
            max_gap_seconds: self.max_gap_seconds,
            exit_grace_seconds: self.exit_grace_seconds,
            transition_gap_seconds: self.transition_gap_seconds,
            min_dwell_seconds: self.min_dwell_seconds,
            timezone,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show time span, sampling intervals and bounds of a track export
    Inspect {
        /// Track export CSV (geoTime, latitude, longitude)
        #[arg(long, default_value = "Path.csv")]
        csv: PathBuf,

        /// Also print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the track with readable local times
    ExportReadable {
        #[arg(long, default_value = "Path.csv")]
        csv: PathBuf,

        #[arg(long, default_value = "readable.csv")]
        out: PathBuf,

        /// Mark each fix as inside/outside this fence (needs all three)
        #[arg(long, requires_all = ["center_lon", "radius_m"])]
        center_lat: Option<f64>,
        #[arg(long)]
        center_lon: Option<f64>,
        #[arg(long)]
        radius_m: Option<f64>,
    },

    /// Detect visits to a circular fence and write them for editing
    FindVisits {
        #[arg(long, default_value = "Path.csv")]
        csv: PathBuf,

        /// JSON run configuration; flags below and `--tz` override it
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Only segment fixes at or after this time
        #[arg(long)]
        range_start: Option<String>,

        /// Only segment fixes before this time
        #[arg(long)]
        range_end: Option<String>,

        #[arg(long, default_value = "visits.csv")]
        out: PathBuf,
    },

    /// Sum visit durations from a (possibly hand-edited) visits CSV
    SumVisits {
        #[arg(long, default_value = "visits.csv")]
        visits: PathBuf,

        /// Clip visits to start at this time
        #[arg(long)]
        range_start: Option<String>,

        /// Clip visits to end before this time
        #[arg(long)]
        range_end: Option<String>,

        /// Also print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a synthetic track export (needs the `synthetic` feature)
    Generate {
        #[arg(long, default_value = "sample_data/Path.csv")]
        out: PathBuf,

        #[arg(long, default_value = "500")]
        rows: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// First sample time (local)
        #[arg(long, default_value = "2025-01-01 08:00:00")]
        start: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(DwellError::MalformedRecords(records)) => {
            eprintln!("Error: {} visit rows need fixing:", records.len());
            for r in records {
                eprintln!("  - {}", r);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let tz = parse_timezone(cli.tz.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;
    match cli.command {
        Commands::Inspect { csv, json } => run_inspect(&csv, json, tz),
        Commands::ExportReadable {
            csv,
            out,
            center_lat,
            center_lon,
            radius_m,
        } => {
            let fence = match (center_lat, center_lon, radius_m) {
                (Some(lat), Some(lon), Some(r)) => Some(Fence::new(lat, lon, r)),
                _ => None,
            };
            run_export_readable(&csv, &out, fence, tz)
        }
        Commands::FindVisits {
            csv,
            config,
            overrides,
            range_start,
            range_end,
            out,
        } => {
            let overrides = overrides.into_overrides(cli.tz);
            let run_config = RunConfig::resolve(config.as_deref(), &overrides)?;
            let tz = run_config.tz()?;
            run_find_visits(
                &csv,
                &out,
                &run_config,
                (range_start.as_deref(), range_end.as_deref()),
                tz,
            )
        }
        Commands::SumVisits {
            visits,
            range_start,
            range_end,
            json,
        } => run_sum_visits(&visits, range_start.as_deref(), range_end.as_deref(), json, tz),
        Commands::Generate {
            out,
            rows,
            seed,
            start,
        } => run_generate(&out, rows, seed, &start, tz),
    }
}

/// Build a range from optional CLI bounds. A missing bound is taken from
/// `data`, the span of whatever is being clipped.
fn parse_range(
    bounds: (Option<&str>, Option<&str>),
    data: Option<TimeSpan>,
    tz: Tz,
) -> Result<Option<RangeFilter>> {
    let (start, end) = bounds;
    if start.is_none() && end.is_none() {
        return Ok(None);
    }
    let start_ms = match start {
        Some(s) => parse_time_ms(s, tz)?,
        None => data.ok_or_invalid("--range-start is required when there is no data")?.start_ms,
    };
    let end_ms = match end {
        Some(s) => parse_time_ms(s, tz)?,
        None => data.ok_or_invalid("--range-end is required when there is no data")?.end_ms,
    };
    RangeFilter::new(start_ms, end_ms).map(Some)
}

fn load_normalized(csv: &Path) -> Result<Vec<Fix>> {
    let (fixes, summary) = read_track_csv(csv)?;
    if summary.rows_skipped > 0 {
        println!(
            "  Skipped {} of {} rows that failed to parse",
            summary.rows_skipped, summary.rows_total
        );
    }
    let (fixes, report) = normalize_fixes(fixes);
    info!(
        "Normalized track: kept {} of {} fixes",
        report.kept, report.input
    );
    Ok(fixes)
}

fn run_inspect(csv: &Path, json: bool, tz: Tz) -> Result<()> {
    let (fixes, summary) = read_track_csv(csv)?;
    let inspection = inspect_fixes(&fixes);

    println!("\n{}", "=".repeat(60));
    println!("TRACK: {}", csv.display());
    println!("{}", "=".repeat(60));
    println!("  Columns: {}", summary.fieldnames.join(", "));
    println!(
        "  Rows: {} total, {} parsed, {} skipped",
        summary.rows_total, summary.rows_parsed, summary.rows_skipped
    );
    if let (Some(first), Some(last)) = (inspection.first_ms, inspection.last_ms) {
        println!("  First fix: {}", format_local(first, tz)?);
        println!("  Last fix:  {}", format_local(last, tz)?);
    }
    if let Some(d) = &inspection.delta {
        println!(
            "  Sampling interval (s): min={:.1} median={:.1} p95={:.1} max={:.1}",
            d.min_s, d.median_s, d.p95_s, d.max_s
        );
    }
    if let Some(b) = &inspection.bounds {
        let c = b.center();
        println!(
            "  Bounds: [{:.5}, {:.5}] to [{:.5}, {:.5}], center [{:.5}, {:.5}]",
            b.min_lat, b.min_lng, b.max_lat, b.max_lng, c.latitude, c.longitude
        );
    }
    println!("  Duplicate timestamps: {}", inspection.duplicate_times);

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    }
    Ok(())
}

fn run_export_readable(csv: &Path, out: &Path, fence: Option<Fence>, tz: Tz) -> Result<()> {
    if let Some(f) = &fence {
        f.validate()?;
    }
    let fixes = load_normalized(csv)?;
    write_readable_csv(out, &fixes, tz, fence.as_ref())?;
    println!("Exported: {}", out.display());
    Ok(())
}

fn run_find_visits(
    csv: &Path,
    out: &Path,
    config: &RunConfig,
    range_bounds: (Option<&str>, Option<&str>),
    tz: Tz,
) -> Result<()> {
    let fixes = load_normalized(csv)?;
    // Half-open: one past the last fix keeps it inside the range.
    let data = match (fixes.first(), fixes.last()) {
        (Some(first), Some(last)) => Some(TimeSpan::new(first.time_ms, last.time_ms + 1)),
        _ => None,
    };
    let range = parse_range(range_bounds, data, tz)?;
    let fixes = match &range {
        Some(r) => clip_fixes(&fixes, r),
        None => &fixes[..],
    };

    let detector = VisitDetector::new(config.fence, config.thresholds)?;
    let visits = detector.detect(fixes)?;
    let visits = filter_min_dwell(&visits, config.min_dwell_seconds);

    let mut store = VisitStore::new();
    store.replace_computed(visits)?;
    write_visits_csv(out, store.visits(), tz)?;

    let total_s: f64 = store.visits().iter().map(|v| v.duration_seconds()).sum();
    println!(
        "Found {} visits, total {} ({:.1}s)",
        store.len(),
        format_hhmmss(total_s),
        total_s
    );
    println!(
        "Exported: {} (edit start_time/end_time by hand, then run sum-visits)",
        out.display()
    );
    Ok(())
}

fn run_sum_visits(
    path: &Path,
    range_start: Option<&str>,
    range_end: Option<&str>,
    json: bool,
    tz: Tz,
) -> Result<()> {
    let records = read_visit_records_csv(path)?;
    let mut store = VisitStore::new();
    store.load_edited(&records, tz)?;

    let data = match (
        store.visits().iter().map(|v| v.start_ms).min(),
        store.visits().iter().map(|v| v.end_ms).max(),
    ) {
        (Some(start), Some(end)) => Some(TimeSpan::new(start, end.max(start + 1))),
        _ => None,
    };
    let range = parse_range((range_start, range_end), data, tz)?;
    let summary = aggregate(store.visits(), range.as_ref(), tz)?;

    println!(
        "visits={}, total={} ({:.1}s), days={}, average/day={}",
        summary.visit_count(),
        format_hhmmss(summary.total_seconds()),
        summary.total_seconds(),
        summary.day_count,
        format_hhmmss(summary.average_per_day_seconds())
    );
    for (day, ms) in &summary.per_day {
        println!("  {}  {}", day, format_hhmmss(*ms as f64 / 1000.0));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

#[cfg(not(feature = "synthetic"))]
fn run_generate(_out: &Path, _rows: usize, _seed: u64, _start: &str, _tz: Tz) -> Result<()> {
    Err(DwellError::InvalidInput {
        reason: "this build does not include the `synthetic` feature".to_string(),
    })
}

#[cfg(feature = "synthetic")]
fn run_generate(out: &Path, rows: usize, seed: u64, start: &str, tz: Tz) -> Result<()> {
    use geodwell::synthetic::SyntheticScenario;

    let start_ms = parse_time_ms(start, tz)?;
    let fixes = SyntheticScenario::demo(start_ms, rows, seed).generate();
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    geodwell::io::write_track_csv(out, &fixes)?;
    println!("Generated: {} (rows={}, seed={})", out.display(), rows, seed);
    Ok(())
}
