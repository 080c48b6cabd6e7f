//! Error types module
//!
//! `ConfigError` aborts a run before any task starts. `WorkflowError` is the
//! per-task taxonomy: some variants end the task, the archive and download
//! variants only downgrade a success to a warning. `TransitionError` guards
//! the task state machine.

use std::time::Duration;

use crate::models::{AssetId, TaskStatus, WorkflowStep};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Conflicting options: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Asset creation failed: {0}")]
    CreateFailed(String),

    #[error("Transfer to object storage failed: {0}")]
    TransferFailed(String),

    #[error("Upload completion notice failed: {0}")]
    NotifyFailed(String),

    #[error("Processing failed with status {status}")]
    ProcessingFailed { status: String },

    #[error("Processing did not finish within {}s", .0.as_secs())]
    ProcessingTimeout(Duration),

    #[error("Status check failed: {0}")]
    StatusCheckFailed(String),

    #[error("Archive creation failed: {0}")]
    ArchiveFailed(String),

    #[error("Archive did not finish within {}s", .0.as_secs())]
    ArchiveTimeout(Duration),

    #[error("Archive download failed: {0}")]
    DownloadFailed(String),

    #[error("Interrupted during {0}")]
    Interrupted(WorkflowStep),
}

/// Static metadata per variant: (step, error_code).
fn workflow_error_static_metadata(err: &WorkflowError) -> (WorkflowStep, &'static str) {
    match err {
        WorkflowError::CreateFailed(_) => (WorkflowStep::CreateAsset, "CREATE_FAILED"),
        WorkflowError::TransferFailed(_) => (WorkflowStep::Upload, "TRANSFER_FAILED"),
        WorkflowError::NotifyFailed(_) => (WorkflowStep::Notify, "NOTIFY_FAILED"),
        WorkflowError::ProcessingFailed { .. } => {
            (WorkflowStep::Processing, "PROCESSING_FAILED")
        }
        WorkflowError::ProcessingTimeout(_) => {
            (WorkflowStep::Processing, "PROCESSING_TIMEOUT")
        }
        WorkflowError::StatusCheckFailed(_) => {
            (WorkflowStep::Processing, "STATUS_CHECK_FAILED")
        }
        WorkflowError::ArchiveFailed(_) => (WorkflowStep::Archive, "ARCHIVE_FAILED"),
        WorkflowError::ArchiveTimeout(_) => (WorkflowStep::Archive, "ARCHIVE_TIMEOUT"),
        WorkflowError::DownloadFailed(_) => (WorkflowStep::Download, "DOWNLOAD_FAILED"),
        WorkflowError::Interrupted(step) => (*step, "INTERRUPTED"),
    }
}

impl WorkflowError {
    /// Step the error originated from.
    pub fn step(&self) -> WorkflowStep {
        workflow_error_static_metadata(self).0
    }

    /// Machine-readable error code (e.g. "TRANSFER_FAILED").
    pub fn error_code(&self) -> &'static str {
        workflow_error_static_metadata(self).1
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    #[error("Asset id already assigned ({existing})")]
    AssetIdAlreadySet { existing: AssetId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_error_is_attributed_to_its_step() {
        assert_eq!(
            WorkflowError::CreateFailed("x".into()).step(),
            WorkflowStep::CreateAsset
        );
        assert_eq!(
            WorkflowError::StatusCheckFailed("x".into()).step(),
            WorkflowStep::Processing
        );
        let archive = WorkflowError::ArchiveTimeout(Duration::from_secs(300));
        assert_eq!(archive.step(), WorkflowStep::Archive);
        assert_eq!(archive.error_code(), "ARCHIVE_TIMEOUT");
        assert_eq!(
            WorkflowError::DownloadFailed("x".into()).step(),
            WorkflowStep::Download
        );
    }

    #[test]
    fn test_step_and_code() {
        let err = WorkflowError::TransferFailed("denied".into());
        assert_eq!(err.step(), WorkflowStep::Upload);
        assert_eq!(err.error_code(), "TRANSFER_FAILED");

        let err = WorkflowError::Interrupted(WorkflowStep::Processing);
        assert_eq!(err.step(), WorkflowStep::Processing);
        assert_eq!(err.error_code(), "INTERRUPTED");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            WorkflowError::ProcessingTimeout(Duration::from_secs(900)).to_string(),
            "Processing did not finish within 900s"
        );
        assert_eq!(
            WorkflowError::ProcessingFailed {
                status: "DATA_ERROR".into()
            }
            .to_string(),
            "Processing failed with status DATA_ERROR"
        );
    }
}
