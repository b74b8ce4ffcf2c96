use std::collections::BTreeSet;
use std::time::Duration;

use crate::outcome::{ImportError, RowOutcome, RowReport};
use crate::view_model::{estimate_remaining, ProgressView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    /// Cancel requested; rows already in flight may still report.
    Cancelling,
    Finished,
}

/// Accounting for one import run.
///
/// `success_count` counts every row whose contact was created, including rows
/// whose label attachment then failed. Such rows also appear in `errors`; the
/// per-row `outcomes` tell the two apart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportState {
    session: SessionState,
    total_rows: usize,
    processed_rows: usize,
    success_count: usize,
    errors: Vec<ImportError>,
    outcomes: Vec<RowOutcome>,
    elapsed: Duration,
    cancelled: bool,
    dirty: bool,
}

/// Final result of a run. Errors and outcomes are ordered by source position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub errors: Vec<ImportError>,
    pub outcomes: Vec<RowOutcome>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ImportSummary {
    /// Distinct rows that have at least one error record.
    pub fn rows_with_errors(&self) -> usize {
        self.errors
            .iter()
            .map(|err| (err.file_index, err.row))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn partial_rows(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_partial()).count()
    }
}

impl ImportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn errors(&self) -> &[ImportError] {
        &self.errors
    }

    pub fn view(&self) -> ProgressView {
        let percent = if self.total_rows > 0 {
            self.success_count as f64 * 100.0 / self.total_rows as f64
        } else {
            0.0
        };
        let estimated_remaining = match self.session {
            SessionState::Running => {
                estimate_remaining(self.total_rows, self.success_count, self.elapsed)
            }
            _ => None,
        };
        ProgressView {
            session: self.session,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            success_count: self.success_count,
            error_count: self.errors.len(),
            partial_rows: self.outcomes.iter().filter(|o| o.is_partial()).count(),
            percent,
            estimated_remaining,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn summary(&self) -> ImportSummary {
        let mut errors = self.errors.clone();
        // Stable sort keeps the contact error ahead of label errors for a row.
        errors.sort_by_key(|err| (err.file_index, err.row));
        let mut outcomes = self.outcomes.clone();
        outcomes.sort_by_key(|outcome| (outcome.file_index, outcome.row));
        ImportSummary {
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            success_count: self.success_count,
            errors,
            outcomes,
            cancelled: self.cancelled,
            elapsed: self.elapsed,
        }
    }

    pub(crate) fn start(&mut self, total_rows: usize) {
        *self = Self {
            session: SessionState::Running,
            total_rows,
            dirty: true,
            ..Self::default()
        };
    }

    pub(crate) fn apply_row(&mut self, report: RowReport) {
        self.processed_rows += 1;
        if report.outcome.contact_created {
            self.success_count += 1;
        }
        self.outcomes.push(report.outcome);
        self.errors.extend(report.errors);
        self.dirty = true;
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        if self.elapsed != elapsed {
            self.elapsed = elapsed;
            self.dirty = true;
        }
    }

    pub(crate) fn request_cancel(&mut self) {
        self.session = SessionState::Cancelling;
        self.cancelled = true;
        self.dirty = true;
    }

    pub(crate) fn finish(&mut self) {
        self.session = SessionState::Finished;
        self.dirty = true;
    }
}
