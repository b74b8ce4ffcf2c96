use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A run begins; any previous run's state is discarded.
    ImportStarted { total_rows: usize },
    /// The runner finished one row.
    RowFinished(crate::RowReport),
    /// Wall-clock time since the run started.
    Tick { elapsed: Duration },
    /// User asked to stop before all rows are processed.
    CancelRequested,
    /// No more rows will report.
    ImportFinished,
    /// Return to an empty idle state.
    Reset,
}
