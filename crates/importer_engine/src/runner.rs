use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use importer_core::{
    partition_labels, update, validate_and_format_row, FieldMapping, ImportError, ImportErrorKind,
    ImportState, ImportSummary, Msg, RawRow, RowOutcome, RowReport,
};
use importer_logging::{import_debug, import_info, import_warn};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{ApiError, ContactApi, CreateContactOutcome, EngineEvent, FailureKind, ImportTarget};

#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    /// Rows processed at the same time. `1` keeps rows strictly sequential.
    pub max_concurrent_rows: usize,
    /// Pause taken after each row before its slot is released.
    pub row_delay: Duration,
    /// Deadline for every individual remote call.
    pub call_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_rows: 1,
            row_delay: Duration::from_millis(100),
            call_timeout: Duration::from_secs(30),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// One decoded input file together with the mapping confirmed for it.
#[derive(Debug, Clone, Default)]
pub struct ImportFile {
    pub name: String,
    pub mappings: Vec<FieldMapping>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone)]
pub struct ImportJob {
    pub target: ImportTarget,
    pub files: Vec<ImportFile>,
}

impl ImportJob {
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|file| file.rows.len()).sum()
    }
}

/// Imports every row of `job` and returns the final accounting.
///
/// A failing row never stops the run. Cancelling `cancel` stops new rows
/// from starting; rows already started still finish and are recorded.
pub async fn run_import(
    api: Arc<dyn ContactApi>,
    job: ImportJob,
    settings: RunnerSettings,
    cancel: CancellationToken,
    sink: &dyn ProgressSink,
) -> ImportSummary {
    let total_rows = job.total_rows();
    let target = job.target;
    import_info!(
        "Importing {} rows from {} file(s) into account {}, inbox {}",
        total_rows,
        job.files.len(),
        target.account_id,
        target.inbox_id
    );

    let started = Instant::now();
    let mut run = RunLoop {
        state: update(ImportState::new(), Msg::ImportStarted { total_rows }),
        started,
        sink,
    };
    run.publish();

    let slots = settings.max_concurrent_rows.clamp(1, Semaphore::MAX_PERMITS);
    let semaphore = Arc::new(Semaphore::new(slots));
    let (tx, mut rx) = mpsc::unbounded_channel::<RowReport>();
    let mut stopped_early = false;

    'files: for (file_index, file) in job.files.into_iter().enumerate() {
        let mappings = Arc::new(file.mappings);
        for (index, row) in file.rows.into_iter().enumerate() {
            let permit = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break None,
                    Some(report) = rx.recv() => run.record(report),
                    permit = semaphore.clone().acquire_owned() => break permit.ok(),
                }
            };
            let Some(permit) = permit.filter(|_| !cancel.is_cancelled()) else {
                stopped_early = true;
                break 'files;
            };

            let api = api.clone();
            let mappings = mappings.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let report = process_row(
                    api.as_ref(),
                    target,
                    file_index,
                    index + 1,
                    row,
                    &mappings,
                    settings.call_timeout,
                )
                .await;
                let _ = tx.send(report);
                tokio::time::sleep(settings.row_delay).await;
                drop(permit);
            });
        }
    }
    drop(tx);

    if stopped_early {
        import_warn!("Import cancelled; waiting for rows in flight");
        run.apply(Msg::CancelRequested);
    }
    while let Some(report) = rx.recv().await {
        run.record(report);
    }
    run.apply(Msg::ImportFinished);

    let summary = run.state.summary();
    import_info!(
        "Import finished: {} of {} rows succeeded, {} error(s){}",
        summary.success_count,
        summary.total_rows,
        summary.errors.len(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    summary
}

struct RunLoop<'a> {
    state: ImportState,
    started: Instant,
    sink: &'a dyn ProgressSink,
}

impl RunLoop<'_> {
    /// Emits the report before logging its failures so a sink can close any
    /// partially drawn output first.
    fn record(&mut self, report: RowReport) {
        self.sink.emit(EngineEvent::RowFinished(report.clone()));
        for err in &report.errors {
            if err.kind() == ImportErrorKind::Other {
                import_warn!("Row {}: {}", err.row, err.error.message);
            }
        }
        self.apply(Msg::Tick {
            elapsed: self.started.elapsed(),
        });
        self.apply(Msg::RowFinished(report));
    }

    fn apply(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        self.state = update(state, msg);
        self.publish();
    }

    fn publish(&mut self) {
        if self.state.consume_dirty() {
            self.sink.emit(EngineEvent::Progress(self.state.view()));
        }
    }
}

/// Validates, creates and labels one row. Every failure becomes an
/// [`ImportError`] on the returned report.
pub async fn process_row(
    api: &dyn ContactApi,
    target: ImportTarget,
    file_index: usize,
    row_number: usize,
    row: RawRow,
    mappings: &[FieldMapping],
    call_timeout: Duration,
) -> RowReport {
    let mut report = RowReport {
        outcome: RowOutcome {
            file_index,
            row: row_number,
            contact_created: false,
            labels_attached: None,
        },
        errors: Vec::new(),
    };
    let validation = validate_and_format_row(&row, mappings);
    if !validation.is_valid() {
        import_debug!("Row {} failed validation", row_number);
        let message = validation.errors.join(", ");
        push_error(&mut report, &row, ImportErrorKind::Validation, message);
        return report;
    }
    let contact = validation.formatted;

    let created = match with_deadline(
        call_timeout,
        api.create_contact(target.account_id, target.inbox_id, &contact),
    )
    .await
    {
        Ok(CreateContactOutcome::Created(created)) => created,
        Ok(CreateContactOutcome::Rejected { kind, message }) => {
            import_debug!("Row {} rejected as {}", row_number, kind);
            push_error(&mut report, &row, kind, message);
            return report;
        }
        Err(err) => {
            import_debug!("Row {} failed: {}", row_number, err.kind);
            push_error(&mut report, &row, ImportErrorKind::Other, err.message);
            return report;
        }
    };
    report.outcome.contact_created = true;

    let Some(labels) = contact.labels else {
        return report;
    };
    let split = partition_labels(labels);

    if !split.valid_labels.is_empty() {
        let attached = with_deadline(
            call_timeout,
            api.attach_labels(target.account_id, created.id, &split.valid_labels),
        )
        .await;
        match attached {
            Ok(attachment) => {
                import_debug!(
                    "Row {}: {} label(s) added to contact {}",
                    row_number,
                    attachment.added.len(),
                    created.id
                );
                report.outcome.labels_attached = Some(true);
            }
            Err(err) => {
                import_debug!("Row {}: labels not attached ({})", row_number, err.kind);
                report.outcome.labels_attached = Some(false);
                push_error(
                    &mut report,
                    &row,
                    ImportErrorKind::Other,
                    format!(
                        "Contact created successfully, but failed to add labels: {}",
                        err.message
                    ),
                );
            }
        }
    }

    if !split.invalid_labels.is_empty() {
        push_error(
            &mut report,
            &row,
            ImportErrorKind::Validation,
            format!(
                "Contact created successfully, but the following labels were skipped due to invalid format: {}. Labels can only contain letters, numbers, hyphens and underscores.",
                split.invalid_labels.join(", ")
            ),
        );
    }

    report
}

fn push_error(report: &mut RowReport, row: &RawRow, kind: ImportErrorKind, message: String) {
    report.errors.push(ImportError::new(
        report.outcome.file_index,
        report.outcome.row,
        row.clone(),
        kind,
        message,
    ));
}

async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::new(
            FailureKind::Timeout,
            format!("No response within {} ms", deadline.as_millis()),
        )),
    }
}
