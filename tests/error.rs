//! Tests for error module

use geodwell::error::{DwellError, MalformedRecord, OptionExt};

#[test]
fn test_error_display() {
    let err = DwellError::InvalidInput {
        reason: "fix 3 is out of order".to_string(),
    };
    assert!(err.to_string().contains("invalid input"));
    assert!(err.to_string().contains("fix 3"));
}

#[test]
fn test_malformed_records_display_lists_every_row() {
    let err = DwellError::MalformedRecords(vec![
        MalformedRecord {
            row: 2,
            visit_id: Some("7".to_string()),
            reason: "end_time is before start_time".to_string(),
        },
        MalformedRecord {
            row: 5,
            visit_id: None,
            reason: "start_time is missing".to_string(),
        },
    ]);
    let text = err.to_string();
    assert!(text.starts_with("2 malformed"));
    assert!(text.contains("row 2 (visit 7)"));
    assert!(text.contains("row 5: start_time is missing"));
}

#[test]
fn test_option_ext() {
    let none: Option<i32> = None;
    let result = none.ok_or_invalid("nothing there");
    assert!(matches!(result, Err(DwellError::InvalidInput { .. })));

    assert_eq!(Some(4).ok_or_invalid("unused").unwrap(), 4);
}

#[test]
fn test_io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: DwellError = io.into();
    assert!(matches!(err, DwellError::Io(_)));
}
