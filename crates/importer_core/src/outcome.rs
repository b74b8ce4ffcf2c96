use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::RawRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorKind {
    DuplicatePhone,
    DuplicateEmail,
    Validation,
    Other,
}

impl ImportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportErrorKind::DuplicatePhone => "duplicate_phone",
            ImportErrorKind::DuplicateEmail => "duplicate_email",
            ImportErrorKind::Validation => "validation",
            ImportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ImportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportErrorDetail {
    #[serde(rename = "type")]
    pub kind: ImportErrorKind,
    pub message: String,
}

/// A failure recorded against one input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    /// Position of the source file within the run.
    #[serde(skip)]
    pub file_index: usize,
    /// 1-based row number within its file.
    pub row: usize,
    pub data: RawRow,
    pub error: ImportErrorDetail,
}

impl ImportError {
    pub fn new(
        file_index: usize,
        row: usize,
        data: RawRow,
        kind: ImportErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_index,
            row,
            data,
            error: ImportErrorDetail {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn kind(&self) -> ImportErrorKind {
        self.error.kind
    }
}

/// What happened to a single row, independent of how it is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutcome {
    pub file_index: usize,
    pub row: usize,
    pub contact_created: bool,
    /// `None` when the row had no valid labels to attach.
    pub labels_attached: Option<bool>,
}

impl RowOutcome {
    /// Contact exists but some of its labels could not be attached.
    pub fn is_partial(&self) -> bool {
        self.contact_created && self.labels_attached == Some(false)
    }
}

/// Result of processing one row, as produced by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub outcome: RowOutcome,
    pub errors: Vec<ImportError>,
}
