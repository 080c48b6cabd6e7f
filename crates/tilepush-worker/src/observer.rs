//! Observer that turns workflow events into `tracing` records.

use tilepush_core::events::{TaskEvent, TaskEventKind, TaskObserver};

/// Logs every event with structured fields. Progress goes to `debug`,
/// warnings and transient errors to `warn`, failures to `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TaskObserver for TracingObserver {
    fn on_event(&self, event: &TaskEvent) {
        let file = event.task.file.as_str();
        let index = event.task.index;

        match &event.kind {
            TaskEventKind::Transition { from, to } => {
                tracing::debug!(file, index, from = %from, to = %to, "Task status changed");
            }
            TaskEventKind::AssetCreated { asset_id } => {
                tracing::info!(file, index, asset_id, "Asset created");
            }
            TaskEventKind::ArchiveCreated { archive_id } => {
                tracing::info!(file, index, archive_id, "Archive requested");
            }
            TaskEventKind::Progress {
                step,
                status,
                percent_complete,
                elapsed,
            } => {
                tracing::debug!(
                    file,
                    index,
                    step = %step,
                    status = %status,
                    percent_complete = ?percent_complete,
                    elapsed_secs = elapsed.as_secs(),
                    "Still waiting"
                );
            }
            TaskEventKind::TransientError { step, error } => {
                tracing::warn!(file, index, step = %step, error = %error, "Transient status check error, will retry");
            }
            TaskEventKind::Warning { step, error } => {
                tracing::warn!(file, index, step = %step, error = %error, "Optional step failed");
            }
            TaskEventKind::Failed {
                step,
                error_code,
                error,
            } => {
                tracing::error!(
                    file,
                    index,
                    step = %step,
                    error_code,
                    error = %error,
                    "Task failed"
                );
            }
            TaskEventKind::Downloaded { path, bytes } => {
                tracing::info!(file, index, path = %path, size_bytes = bytes, "Archive downloaded");
            }
        }
    }
}
