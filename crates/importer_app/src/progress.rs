use std::io::{self, Stderr, Write};
use std::sync::Mutex;

use importer_core::{ProgressView, SessionState};
use importer_engine::{EngineEvent, ProgressSink};
use importer_logging::import_debug;

/// Renders the progress line in place on a terminal stream.
///
/// The line is closed before a row with errors is handed on, so the log lines
/// that follow start on a fresh line.
pub struct TerminalProgress<W = Stderr> {
    out: Mutex<Output<W>>,
}

struct Output<W> {
    writer: W,
    line_open: bool,
}

impl TerminalProgress {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: Mutex::new(Output {
                writer,
                line_open: false,
            }),
        }
    }

    fn with_output(&self, write: impl FnOnce(&mut Output<W>) -> io::Result<()>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = write(&mut *out).and_then(|()| out.writer.flush());
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out.writer,
            Err(poisoned) => poisoned.into_inner().writer,
        }
    }
}

impl<W: Write> Output<W> {
    fn close_line(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.line_open) {
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

impl<W: Write + Send> ProgressSink for TerminalProgress<W> {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::RowFinished(report) => {
                if report.errors.is_empty() {
                    return;
                }
                self.with_output(Output::close_line);
                for err in &report.errors {
                    import_debug!("Row {}: {} ({})", err.row, err.error.message, err.kind());
                }
            }
            EngineEvent::Progress(view) => self.with_output(|out| {
                write!(out.writer, "\r{}", render_line(&view))?;
                out.line_open = true;
                if view.session == SessionState::Finished {
                    out.close_line()?;
                }
                Ok(())
            }),
        }
    }
}

pub fn render_line(view: &ProgressView) -> String {
    let mut line = format!(
        "Processing contacts... {:.0}% ({} of {} contacts)",
        view.percent, view.processed_rows, view.total_rows
    );
    if let Some(remaining) = &view.estimated_remaining {
        line.push_str(&format!(" • {remaining} remaining"));
    }
    line
}

pub fn summary_line(success_count: usize, error_count: usize) -> String {
    format!("Successfully imported {success_count} contacts. {error_count} errors occurred.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use importer_core::{ImportError, ImportErrorKind, RowOutcome, RowReport};

    fn running(processed_rows: usize) -> ProgressView {
        ProgressView {
            session: SessionState::Running,
            total_rows: 4,
            processed_rows,
            ..ProgressView::default()
        }
    }

    fn failed_row(row: usize) -> RowReport {
        RowReport {
            outcome: RowOutcome {
                file_index: 0,
                row,
                contact_created: false,
                labels_attached: None,
            },
            errors: vec![ImportError::new(
                0,
                row,
                Default::default(),
                ImportErrorKind::Other,
                "connection refused",
            )],
        }
    }

    #[test]
    fn failed_row_closes_the_open_line_once() {
        let progress = TerminalProgress::new(Vec::new());
        progress.emit(EngineEvent::Progress(running(1)));
        progress.emit(EngineEvent::RowFinished(failed_row(2)));
        progress.emit(EngineEvent::RowFinished(failed_row(3)));
        progress.emit(EngineEvent::Progress(ProgressView {
            session: SessionState::Finished,
            ..running(3)
        }));

        let written = String::from_utf8(progress.into_inner()).unwrap();
        assert_eq!(
            written,
            "\rProcessing contacts... 0% (1 of 4 contacts)\n\rProcessing contacts... 0% (3 of 4 contacts)\n"
        );
    }

    #[test]
    fn line_shows_eta_only_when_known() {
        let mut view = ProgressView {
            session: SessionState::Running,
            total_rows: 10,
            processed_rows: 3,
            success_count: 2,
            percent: 20.0,
            ..ProgressView::default()
        };
        assert_eq!(
            render_line(&view),
            "Processing contacts... 20% (3 of 10 contacts)"
        );

        view.estimated_remaining = Some("16 seconds".to_string());
        assert_eq!(
            render_line(&view),
            "Processing contacts... 20% (3 of 10 contacts) • 16 seconds remaining"
        );
    }

    #[test]
    fn summary_wording() {
        assert_eq!(
            summary_line(2, 1),
            "Successfully imported 2 contacts. 1 errors occurred."
        );
    }
}
