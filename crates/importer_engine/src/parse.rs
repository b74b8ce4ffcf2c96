use std::fs;
use std::path::Path;

use importer_core::RawRow;
use importer_logging::import_debug;
use serde_json::Value;
use thiserror::Error;

use crate::decode::{decode_text, DecodeError};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON file must contain an array of objects")]
    NotAnArrayOfObjects,
}

/// Column names and rows of one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Reads and parses a `.csv` or `.json` file, chosen by extension.
pub fn parse_file(path: &Path) -> Result<ParsedFile, ParseError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if extension != "csv" && extension != "json" {
        return Err(ParseError::UnsupportedFileType(path.display().to_string()));
    }

    let bytes = fs::read(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let decoded = decode_text(&bytes)?;
    import_debug!("Decoded {} as {}", path.display(), decoded.encoding_label);

    let mut parsed = if extension == "csv" {
        parse_csv(&decoded.text)?
    } else {
        parse_json(&decoded.text)?
    };
    parsed.name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(parsed)
}

/// Parses CSV text whose first record holds the column names.
///
/// Cells are trimmed and kept as strings. Records with no content are
/// skipped; a short record simply lacks the trailing columns. A repeated
/// column name gets a numeric suffix (`email`, `email_1`) so no cell is lost.
pub fn parse_csv(text: &str) -> Result<ParsedFile, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = dedupe_headers(reader.headers()?.iter());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(ParsedFile {
        name: String::new(),
        headers,
        rows,
    })
}

fn dedupe_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for name in names {
        let mut unique = name.to_string();
        let mut suffix = 1;
        while headers.contains(&unique) {
            unique = format!("{name}_{suffix}");
            suffix += 1;
        }
        if unique != name {
            import_debug!("Renamed duplicate column {:?} to {:?}", name, unique);
        }
        headers.push(unique);
    }
    headers
}

/// Parses a JSON array of objects. The headers are the union of all keys in
/// first-seen order.
pub fn parse_json(text: &str) -> Result<ParsedFile, ParseError> {
    let Value::Array(items) = serde_json::from_str::<Value>(text)? else {
        return Err(ParseError::NotAnArrayOfObjects);
    };

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(row) = item else {
            return Err(ParseError::NotAnArrayOfObjects);
        };
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        rows.push(row);
    }

    Ok(ParsedFile {
        name: String::new(),
        headers,
        rows,
    })
}
