use std::time::Duration;

use crate::SessionState;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressView {
    pub session: SessionState,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub partial_rows: usize,
    /// Successful rows as a percentage of all rows.
    pub percent: f64,
    pub estimated_remaining: Option<String>,
}

/// Remaining time at the observed rate of successful rows.
///
/// `None` until at least one row succeeded and some time has elapsed.
pub fn estimate_remaining(
    total_rows: usize,
    success_count: usize,
    elapsed: Duration,
) -> Option<String> {
    if success_count == 0 || elapsed.is_zero() {
        return None;
    }
    let per_row = elapsed.as_secs_f64() / success_count as f64;
    let remaining = total_rows.saturating_sub(success_count) as f64 * per_row;
    Some(format_remaining(remaining))
}

/// Renders seconds as whole seconds, minutes or hours depending on magnitude.
pub fn format_remaining(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{} seconds", seconds.round())
    } else if seconds < 3600.0 {
        format!("{} minutes", (seconds / 60.0).round())
    } else {
        format!("{} hours", (seconds / 3600.0).round())
    }
}
