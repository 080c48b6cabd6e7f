use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use crate::error::TransitionError;
use crate::models::{ArchiveId, AssetId};

/// Step of the upload workflow. Used to attribute failures and events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    CreateAsset,
    Upload,
    Notify,
    Processing,
    Archive,
    Download,
}

impl Display for WorkflowStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WorkflowStep::CreateAsset => write!(f, "create_asset"),
            WorkflowStep::Upload => write!(f, "upload"),
            WorkflowStep::Notify => write!(f, "notify"),
            WorkflowStep::Processing => write!(f, "processing"),
            WorkflowStep::Archive => write!(f, "archive"),
            WorkflowStep::Download => write!(f, "download"),
        }
    }
}

/// Position of a task in the upload workflow.
///
/// States advance strictly one at a time in declaration order. `Failed`
/// can be entered from any non-failed state and is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    MetadataCreated,
    Uploaded,
    Notified,
    Processing,
    Processed,
    Archiving,
    Archived,
    Downloading,
    Downloaded,
    Failed(WorkflowStep),
}

impl TaskStatus {
    fn rank(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(0),
            TaskStatus::MetadataCreated => Some(1),
            TaskStatus::Uploaded => Some(2),
            TaskStatus::Notified => Some(3),
            TaskStatus::Processing => Some(4),
            TaskStatus::Processed => Some(5),
            TaskStatus::Archiving => Some(6),
            TaskStatus::Archived => Some(7),
            TaskStatus::Downloading => Some(8),
            TaskStatus::Downloaded => Some(9),
            TaskStatus::Failed(_) => None,
        }
    }

    /// Returns true if `next` is a legal transition from `self`.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        match (self.rank(), next) {
            (None, _) => false,
            (Some(_), TaskStatus::Failed(_)) => true,
            (Some(current), next) => next.rank() == Some(current + 1),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::MetadataCreated => write!(f, "metadata_created"),
            TaskStatus::Uploaded => write!(f, "uploaded"),
            TaskStatus::Notified => write!(f, "notified"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Processed => write!(f, "processed"),
            TaskStatus::Archiving => write!(f, "archiving"),
            TaskStatus::Archived => write!(f, "archived"),
            TaskStatus::Downloading => write!(f, "downloading"),
            TaskStatus::Downloaded => write!(f, "downloaded"),
            TaskStatus::Failed(step) => write!(f, "failed({})", step),
        }
    }
}

/// One input file's journey through the workflow.
///
/// Only the worker running the workflow holds a mutable reference; once the
/// task reaches a terminal state it is moved into the result record.
#[derive(Debug, Clone, Serialize)]
pub struct AssetUploadTask {
    file_path: PathBuf,
    asset_id: Option<AssetId>,
    status: TaskStatus,
    error_message: Option<String>,
    archive_id: Option<ArchiveId>,
    download_path: Option<PathBuf>,
}

impl AssetUploadTask {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            asset_id: None,
            status: TaskStatus::Pending,
            error_message: None,
            archive_id: None,
            download_path: None,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// File name component, used for display and as the object key suffix.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    /// Display name for the remote asset: the file name without extension.
    pub fn display_name(&self) -> String {
        self.file_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name())
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        self.asset_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn download_path(&self) -> Option<&Path> {
        self.download_path.as_deref()
    }

    /// Move to the next state. Returns the previous state.
    pub fn advance(&mut self, next: TaskStatus) -> Result<TaskStatus, TransitionError> {
        if !self.status.can_advance_to(next) {
            return Err(TransitionError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Mark the task failed at `step`. Returns the previous state.
    pub fn fail(
        &mut self,
        step: WorkflowStep,
        message: impl Into<String>,
    ) -> Result<TaskStatus, TransitionError> {
        let previous = self.advance(TaskStatus::Failed(step))?;
        self.error_message = Some(message.into());
        Ok(previous)
    }

    /// Record the asset id assigned by the service. Can only happen once.
    pub fn assign_asset_id(&mut self, asset_id: AssetId) -> Result<(), TransitionError> {
        if let Some(existing) = self.asset_id {
            return Err(TransitionError::AssetIdAlreadySet { existing });
        }
        self.asset_id = Some(asset_id);
        Ok(())
    }

    pub fn set_archive_id(&mut self, archive_id: ArchiveId) {
        self.archive_id = Some(archive_id);
    }

    pub fn set_download_path(&mut self, path: PathBuf) {
        self.download_path = Some(path);
    }
}
