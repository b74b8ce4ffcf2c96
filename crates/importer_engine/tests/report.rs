use std::fs;

use importer_core::{ImportError, ImportErrorKind, RawRow};
use importer_engine::{ensure_dir, render_error_report, write_atomic, write_error_report};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn data(value: serde_json::Value) -> RawRow {
    value.as_object().unwrap().clone()
}

#[test]
fn report_lists_errors_in_row_order_with_original_columns() {
    let errors = vec![
        ImportError::new(
            0,
            3,
            data(json!({ "name": "Cy", "email": "cy@example.com" })),
            ImportErrorKind::DuplicateEmail,
            "Email already exists",
        ),
        ImportError::new(
            0,
            1,
            data(json!({ "name": "Ada", "tags": ["a", "b"] })),
            ImportErrorKind::Validation,
            "Name is required, Email is invalid",
        ),
    ];

    let csv = render_error_report(&errors).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Row,Error Type,Error Message,name,tags,email",
            "1,validation,\"Name is required, Email is invalid\",Ada,\"[\"\"a\"\",\"\"b\"\"]\",",
            "3,duplicate_email,Email already exists,Cy,,cy@example.com",
        ]
    );
}

#[test]
fn empty_report_has_only_headers() {
    let csv = render_error_report(&[]).unwrap();
    assert_eq!(csv, "Row,Error Type,Error Message\n");
}

#[test]
fn report_file_is_replaced_atomically() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("reports").join("import-errors.csv");
    let error = ImportError::new(
        0,
        2,
        data(json!({ "name": "Bob" })),
        ImportErrorKind::Other,
        "connection refused",
    );

    write_error_report(&path, &[]).unwrap();
    write_error_report(&path, &[error]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("Row,Error Type,Error Message,name\n"));
    assert!(content.contains("2,other,connection refused,Bob"));
}

#[test]
fn write_atomic_rejects_file_as_directory() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    assert!(ensure_dir(&blocker).is_err());
    assert!(write_atomic(&blocker.join("out.csv"), b"data").is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}
