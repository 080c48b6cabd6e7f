//! Terminal outcome records produced by the workflow and kept by the
//! result aggregator.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use crate::error::WorkflowError;
use crate::models::{ArchiveId, AssetId, WorkflowStep};

/// How far a successful task got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessKind {
    /// Upload accepted; processing was not awaited.
    Initiated,
    /// Processing finished with `COMPLETE`.
    Processed,
}

impl Display for SuccessKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SuccessKind::Initiated => write!(f, "initiated"),
            SuccessKind::Processed => write!(f, "processed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessRecord {
    pub file: String,
    pub message: String,
    pub asset_id: AssetId,
    pub kind: SuccessKind,
    /// Non-fatal archive or download problems.
    pub warnings: Vec<String>,
}

impl SuccessRecord {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub file: String,
    pub step: WorkflowStep,
    pub error: String,
    pub error_code: &'static str,
    pub asset_id: Option<AssetId>,
}

impl FailureRecord {
    pub fn new(file: String, error: &WorkflowError, asset_id: Option<AssetId>) -> Self {
        Self {
            file,
            step: error.step(),
            error: error.to_string(),
            error_code: error.error_code(),
            asset_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRecord {
    pub file: String,
    pub asset_id: AssetId,
    pub archive_id: ArchiveId,
    pub download_path: Option<PathBuf>,
}

/// Terminal category of one task. Every task ends in exactly one.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded(SuccessRecord),
    Failed(FailureRecord),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn file(&self) -> &str {
        match self {
            TaskOutcome::Succeeded(r) => &r.file,
            TaskOutcome::Failed(r) => &r.file,
        }
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            TaskOutcome::Succeeded(r) => Some(r.asset_id),
            TaskOutcome::Failed(r) => r.asset_id,
        }
    }
}
