//! Workflow events and the observer interface
//!
//! The workflow never formats user-facing messages. It emits a `TaskEvent`
//! on every state transition and notable condition; observers decide how to
//! log or display them.

use std::time::Duration;

use crate::models::{ArchiveId, AssetId, TaskStatus, WorkflowStep};

/// Identifies the task an event belongs to.
#[derive(Debug, Clone)]
pub struct TaskRef {
    /// Position of the file in the submitted batch.
    pub index: usize,
    pub file: String,
}

#[derive(Debug, Clone)]
pub enum TaskEventKind {
    /// Status changed.
    Transition { from: TaskStatus, to: TaskStatus },
    /// The service assigned an asset id.
    AssetCreated { asset_id: AssetId },
    /// An archive was requested for the asset.
    ArchiveCreated { archive_id: ArchiveId },
    /// A poll returned a non-terminal status.
    Progress {
        step: WorkflowStep,
        status: String,
        percent_complete: Option<f64>,
        elapsed: Duration,
    },
    /// A poll failed with a transient error; polling continues.
    TransientError { step: WorkflowStep, error: String },
    /// A step failed without failing the task.
    Warning { step: WorkflowStep, error: String },
    /// The task failed at `step`.
    Failed {
        step: WorkflowStep,
        error_code: &'static str,
        error: String,
    },
    /// The archive was written to disk.
    Downloaded { path: String, bytes: u64 },
}

#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task: TaskRef,
    pub kind: TaskEventKind,
}

/// Receives workflow events. Implementations must be cheap and non-blocking;
/// they are called inline from the worker.
pub trait TaskObserver: Send + Sync {
    fn on_event(&self, event: &TaskEvent);
}

/// Observer that discards everything.
pub struct NoOpObserver;

impl TaskObserver for NoOpObserver {
    fn on_event(&self, _event: &TaskEvent) {}
}
