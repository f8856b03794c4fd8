//! Tests for io module

use std::io::Cursor;

use chrono_tz::Tz;
use geodwell::io::*;
use geodwell::{
    ConfigOverrides, DwellError, Fence, Fix, VisitConfig, VisitInterval, VisitStore, aggregate,
    detect_visits,
};
use tempfile::TempDir;

const T0: i64 = 1_764_601_200_000; // 2025-12-01 23:00:00+08:00
const MIN: i64 = 60_000;

fn tz() -> Tz {
    chrono_tz::Asia::Shanghai
}

fn csv_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_read_track_ignores_extra_columns_and_bad_rows() {
    let input = "\
id,geoTime,latitude,longitude,accuracy
1,1764601200000,31.2304,121.4737,5
2,not-a-time,31.2304,121.4737,5
3,1764601260000,31.2305,,5
4,1764601320000.0,31.2306,121.4739,7
";
    let (fixes, summary) = read_track(Cursor::new(input)).unwrap();

    assert_eq!(summary.rows_total, 4);
    assert_eq!(summary.rows_parsed, 2);
    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(summary.fieldnames[1], "geoTime");
    assert_eq!(fixes[0], Fix::new(1_764_601_200_000, 31.2304, 121.4737));
    assert_eq!(fixes[1].time_ms, 1_764_601_320_000);
}

#[test]
fn test_read_track_requires_columns() {
    let input = "time,lat,lon\n1,2,3\n";
    let err = read_track(Cursor::new(input)).unwrap_err();
    assert!(matches!(err, DwellError::InvalidInput { .. }));
    assert!(err.to_string().contains("geoTime"));
}

#[test]
fn test_track_round_trip() {
    let fixes = vec![
        Fix::new(T0, 31.2304, 121.4737),
        Fix::new(T0 + MIN, 31.2305123, 121.4738456),
    ];
    let mut out = Vec::new();
    write_track(&mut out, &fixes).unwrap();

    let text = csv_text(out);
    assert!(text.starts_with("geoTime,latitude,longitude\n"));

    let (back, summary) = read_track(Cursor::new(text)).unwrap();
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(back, fixes);
}

#[test]
fn test_write_readable_marks_fence_membership() {
    let fence = Fence::new(31.2304, 121.4737, 100.0);
    let fixes = vec![
        Fix::new(T0, 31.2304, 121.4737),
        Fix::new(T0 + MIN, 31.2404, 121.4737),
    ];
    let mut out = Vec::new();
    write_readable(&mut out, &fixes, tz(), Some(&fence)).unwrap();
    let text = csv_text(out);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "time_local,epoch_ms,latitude,longitude,inside_fence");
    assert!(lines[1].starts_with("2025-12-01 23:00:00+08:00,1764601200000,"));
    assert!(lines[1].ends_with(",true"));
    assert!(lines[2].ends_with(",false"));
}

#[test]
fn test_write_visits_columns() {
    let visits = vec![VisitInterval::edited(1, T0, T0 + 90 * MIN)];
    let mut out = Vec::new();
    write_visits(&mut out, &visits, tz()).unwrap();
    let text = csv_text(out);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "visit_id,start_time,end_time,duration_seconds,duration_hhmmss,points,\
         start_epoch_ms,end_epoch_ms,method"
    );
    assert_eq!(
        lines[1],
        "1,2025-12-01 23:00:00+08:00,2025-12-02 00:30:00+08:00,5400.000,01:30:00,,\
         1764601200000,1764606600000,edited"
    );
}

#[test]
fn test_hand_edit_takes_effect_on_reload() {
    let fence = Fence::new(31.2304, 121.4737, 150.0);
    let fixes: Vec<Fix> = (0..=60)
        .map(|i| Fix::new(T0 + i * MIN, 31.2304, 121.4737))
        .collect();
    let computed = detect_visits(&fixes, &fence, &VisitConfig::default()).unwrap();

    let mut out = Vec::new();
    write_visits(&mut out, &computed, tz()).unwrap();

    // Someone moves the end time back by half an hour, leaving the epoch
    // column stale.
    let edited = csv_text(out).replace("2025-12-02 00:00:00+08:00", "2025-12-01 23:30:00");

    let records = read_visit_records(Cursor::new(edited)).unwrap();
    let mut store = VisitStore::new();
    store.load_edited(&records, tz()).unwrap();

    assert_eq!(store.visits()[0].end_ms, T0 + 30 * MIN);
    let summary = aggregate(store.visits(), None, tz()).unwrap();
    assert_eq!(summary.total_seconds(), 1800.0);
}

#[test]
fn test_read_visit_records_tolerates_missing_columns() {
    let input = "start_time , end_time\n 2025-12-01 08:00 , 2025-12-01 09:00 \n";
    let records = read_visit_records(Cursor::new(input)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start_time.as_deref(), Some("2025-12-01 08:00"));
    assert!(records[0].visit_id.is_none());
}

#[test]
fn test_files_on_disk() {
    let dir = TempDir::new().unwrap();
    let track = dir.path().join("track.csv");
    let visits_path = dir.path().join("visits.csv");

    let fixes = vec![
        Fix::new(T0, 31.2304, 121.4737),
        Fix::new(T0 + MIN, 31.2304, 121.4737),
    ];
    write_track_csv(&track, &fixes).unwrap();
    let (back, _) = read_track_csv(&track).unwrap();
    assert_eq!(back.len(), 2);

    let visits = vec![VisitInterval::edited(1, T0, T0 + MIN)];
    write_visits_csv(&visits_path, &visits, tz()).unwrap();
    let records = read_visit_records_csv(&visits_path).unwrap();
    assert_eq!(records[0].visit_id.as_deref(), Some("1"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = read_track_csv(dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, DwellError::Io(_)));
}

#[test]
fn test_run_config_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{
            "fence": { "center": { "latitude": 31.2304, "longitude": 121.4737 }, "radius_m": 150.0 },
            "thresholds": { "exit_grace_seconds": 180.0 }
        }"#,
    )
    .unwrap();

    let config = RunConfig::load(&path).unwrap();
    assert_eq!(config.fence.radius_m, 150.0);
    assert_eq!(config.thresholds.exit_grace_seconds, 180.0);
    assert_eq!(config.thresholds.max_gap_seconds, 43_200.0);
    assert_eq!(config.timezone, "Asia/Shanghai");
    assert_eq!(config.min_dwell_seconds, 60.0);
    assert_eq!(config.tz().unwrap(), tz());
}

#[test]
fn test_run_config_validation() {
    let mut config = RunConfig::new(Fence::new(31.2304, 121.4737, 150.0));
    assert!(config.validate().is_ok());

    config.timezone = "Nowhere/Special".to_string();
    assert!(matches!(
        config.validate(),
        Err(DwellError::UnknownTimezone(_))
    ));

    let mut config = RunConfig::new(Fence::new(31.2304, 121.4737, -1.0));
    assert!(config.validate().is_err());
    config.fence.radius_m = 10.0;
    config.min_dwell_seconds = -5.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_run_config_bad_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(RunConfig::load(&path), Err(DwellError::Json(_))));
}

#[test]
fn test_overrides_win_over_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{
            "fence": { "center": { "latitude": 31.2304, "longitude": 121.4737 }, "radius_m": 150.0 },
            "thresholds": { "exit_grace_seconds": 180.0 },
            "timezone": "Asia/Shanghai",
            "min_dwell_seconds": 30.0
        }"#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        radius_m: Some(75.0),
        max_gap_seconds: Some(3600.0),
        timezone: Some("Europe/Berlin".to_string()),
        ..ConfigOverrides::default()
    };
    let config = RunConfig::resolve(Some(path.as_path()), &overrides).unwrap();

    assert_eq!(config.fence.radius_m, 75.0);
    assert_eq!(config.fence.center.latitude, 31.2304);
    assert_eq!(config.thresholds.max_gap_seconds, 3600.0);
    assert_eq!(config.thresholds.exit_grace_seconds, 180.0);
    assert_eq!(config.min_dwell_seconds, 30.0);
    assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Berlin);
}

#[test]
fn test_override_can_repair_invalid_file_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{ "fence": { "center": { "latitude": 31.2304, "longitude": 121.4737 }, "radius_m": 0.0 } }"#,
    )
    .unwrap();

    assert!(RunConfig::load(&path).is_err());
    let overrides = ConfigOverrides {
        radius_m: Some(50.0),
        ..ConfigOverrides::default()
    };
    assert!(RunConfig::resolve(Some(path.as_path()), &overrides).is_ok());
}

#[test]
fn test_resolve_without_file_needs_whole_fence() {
    let partial = ConfigOverrides {
        center_lat: Some(31.2304),
        radius_m: Some(50.0),
        ..ConfigOverrides::default()
    };
    assert!(matches!(
        RunConfig::resolve(None, &partial),
        Err(DwellError::InvalidInput { .. })
    ));

    let whole = ConfigOverrides {
        center_lon: Some(121.4737),
        timezone: Some("UTC".to_string()),
        ..partial
    };
    let config = RunConfig::resolve(None, &whole).unwrap();
    assert_eq!(config.tz().unwrap(), chrono_tz::UTC);
    assert_eq!(config.thresholds, VisitConfig::default());
}

#[test]
fn test_resolve_rejects_bad_override() {
    let overrides = ConfigOverrides {
        center_lat: Some(31.2304),
        center_lon: Some(121.4737),
        radius_m: Some(50.0),
        timezone: Some("Atlantis/Capital".to_string()),
        ..ConfigOverrides::default()
    };
    assert!(matches!(
        RunConfig::resolve(None, &overrides),
        Err(DwellError::UnknownTimezone(_))
    ));
}
