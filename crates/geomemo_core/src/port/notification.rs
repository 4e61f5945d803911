//! Notification dispatcher port.

use crate::model::memo::MemoId;

/// Renders user-facing notifications for the proximity pipeline.
///
/// # Invariants
/// - `notify` is idempotent per `memo_id`: repeated calls update the existing
///   entry in place and alert at most once until `dismiss` is called.
/// - The monitoring status entry is separate from memo entries.
pub trait Notifier: Send + Sync {
    fn notify(&self, memo_id: MemoId, title: &str, body_snippet: &str);
    fn dismiss(&self, memo_id: MemoId);
    /// Shows the persistent "monitoring is active" indicator.
    fn show_monitoring_status(&self);
    fn clear_monitoring_status(&self);
    /// Passive, one-shot indicator that monitoring could not start.
    fn show_monitoring_failure(&self, reason: &str);
}

/// Truncates a memo description to at most `max_chars` characters.
pub fn body_snippet(description: &str, max_chars: usize) -> String {
    description.chars().take(max_chars).collect()
}
