use std::path::Path;

use importer_core::{scalar_text, ImportError};
use importer_logging::import_info;
use thiserror::Error;

use crate::persist::{write_atomic, PersistError};

const FIXED_COLUMNS: [&str; 3] = ["Row", "Error Type", "Error Message"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Renders the error report: `Row, Error Type, Error Message` followed by
/// the union of the original columns in first-seen order.
pub fn render_error_report(errors: &[ImportError]) -> Result<String, ReportError> {
    let mut ordered: Vec<&ImportError> = errors.iter().collect();
    ordered.sort_by_key(|err| (err.file_index, err.row));

    let mut columns: Vec<&str> = Vec::new();
    for err in &ordered {
        for key in err.data.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FIXED_COLUMNS.iter().copied().chain(columns.iter().copied()))?;
    for err in ordered {
        let mut record = vec![
            err.row.to_string(),
            err.error.kind.to_string(),
            err.error.message.clone(),
        ];
        record.extend(columns.iter().map(|column| {
            err.data
                .get(*column)
                .map(scalar_text)
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ReportError::Buffer(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ReportError::Buffer(err.to_string()))
}

/// Writes the error report to `path`, replacing any previous report.
pub fn write_error_report(path: &Path, errors: &[ImportError]) -> Result<(), ReportError> {
    let content = render_error_report(errors)?;
    write_atomic(path, content.as_bytes())?;
    import_info!("Wrote {} error(s) to {}", errors.len(), path.display());
    Ok(())
}
