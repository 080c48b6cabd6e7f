//! Per-file upload workflow
//!
//! Drives one `AssetUploadTask` through create → upload → notify and, when
//! enabled, processing poll → archive → download. Every status change and
//! notable condition is emitted as a `TaskEvent`; the final result is a
//! `TaskOutcome` plus an optional `ArchiveRecord`.

use std::path::PathBuf;
use std::sync::Arc;

use tilepush_core::events::{TaskEvent, TaskEventKind, TaskObserver, TaskRef};
use tilepush_core::models::{
    ArchiveId, ArchiveInfo, ArchiveRecord, ArchiveStatus, AssetId, AssetInfo, AssetStatus,
    AssetUploadTask, CreateAssetRequest, FailureRecord, SuccessKind, SuccessRecord, TaskOutcome,
    TaskStatus, WorkflowStep,
};
use tilepush_core::{UploaderConfig, WorkflowError};
use tilepush_storage::ObjectUploader;
use tokio_util::sync::CancellationToken;

use crate::context::AssetService;
use crate::download::save_download;
use crate::poll::{poll_until, PollNotice, PollOutcome, PollSettings, PollStep};

/// Which optional steps run, and how they poll.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub wait_for_completion: bool,
    pub create_archive: bool,
    pub download_archive: bool,
    pub output_dir: PathBuf,
    pub processing: PollSettings,
    pub archive: PollSettings,
}

impl WorkflowOptions {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            wait_for_completion: config.wait_for_completion,
            create_archive: config.create_archive,
            download_archive: config.download_archive,
            output_dir: config.output_dir.clone(),
            processing: PollSettings {
                interval: config.processing_poll_interval(),
                timeout: config.processing_timeout(),
            },
            archive: PollSettings {
                interval: config.archive_poll_interval(),
                timeout: config.archive_timeout(),
            },
        }
    }
}

/// Everything one finished task produced.
#[derive(Debug)]
pub struct WorkflowReport {
    pub task: AssetUploadTask,
    pub outcome: TaskOutcome,
    pub archive: Option<ArchiveRecord>,
}

/// Runs the workflow for single files. Cheap to clone; shared by all workers.
#[derive(Clone)]
pub struct AssetWorkflow {
    service: Arc<dyn AssetService>,
    uploader: Arc<dyn ObjectUploader>,
    observer: Arc<dyn TaskObserver>,
    options: WorkflowOptions,
}

/// Mutable state of one run.
struct TaskRun<'a> {
    task: AssetUploadTask,
    task_ref: TaskRef,
    observer: &'a dyn TaskObserver,
    warnings: Vec<String>,
    archive: Option<ArchiveRecord>,
}

impl TaskRun<'_> {
    fn emit(&self, kind: TaskEventKind) {
        self.observer.on_event(&TaskEvent {
            task: self.task_ref.clone(),
            kind,
        });
    }

    fn advance(&mut self, next: TaskStatus) {
        match self.task.advance(next) {
            Ok(from) => self.emit(TaskEventKind::Transition { from, to: next }),
            Err(e) => tracing::error!(error = %e, file = %self.task_ref.file, "Rejected status transition"),
        }
    }

    fn warn(&mut self, error: WorkflowError) {
        self.emit(TaskEventKind::Warning {
            step: error.step(),
            error: error.to_string(),
        });
        self.warnings.push(error.to_string());
    }

    fn poll_notice(&self, step: WorkflowStep, notice: PollNotice<'_>) {
        match notice {
            PollNotice::Pending {
                status,
                percent_complete,
                elapsed,
            } => self.emit(TaskEventKind::Progress {
                step,
                status: status.to_string(),
                percent_complete,
                elapsed,
            }),
            PollNotice::TransientError(e) => self.emit(TaskEventKind::TransientError {
                step,
                error: e.to_string(),
            }),
        }
    }
}

impl AssetWorkflow {
    pub fn new(
        service: Arc<dyn AssetService>,
        uploader: Arc<dyn ObjectUploader>,
        observer: Arc<dyn TaskObserver>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            service,
            uploader,
            observer,
            options,
        }
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Run the whole workflow for `file_path`. Never panics on remote errors;
    /// every path ends in exactly one outcome.
    pub async fn run(
        &self,
        index: usize,
        file_path: PathBuf,
        cancel: &CancellationToken,
    ) -> WorkflowReport {
        let task = AssetUploadTask::new(file_path);
        let task_ref = TaskRef {
            index,
            file: task.file_name(),
        };
        let mut run = TaskRun {
            task,
            task_ref,
            observer: self.observer.as_ref(),
            warnings: Vec::new(),
            archive: None,
        };

        let result = self.drive(&mut run, cancel).await;
        self.finish(run, result)
    }

    /// Build the report for a task that never started because the batch was cancelled.
    pub fn interrupted_before_start(&self, index: usize, file_path: PathBuf) -> WorkflowReport {
        let task = AssetUploadTask::new(file_path);
        let task_ref = TaskRef {
            index,
            file: task.file_name(),
        };
        let run = TaskRun {
            task,
            task_ref,
            observer: self.observer.as_ref(),
            warnings: Vec::new(),
            archive: None,
        };
        self.finish(run, Err(WorkflowError::Interrupted(WorkflowStep::CreateAsset)))
    }

    fn finish(
        &self,
        mut run: TaskRun<'_>,
        result: Result<SuccessKind, WorkflowError>,
    ) -> WorkflowReport {
        let file = run.task.file_name();
        let outcome = match result {
            Ok(kind) => {
                let asset_id = run.task.asset_id().unwrap_or_default();
                let message = match kind {
                    SuccessKind::Initiated => {
                        format!("Asset {} created, processing initiated", asset_id)
                    }
                    SuccessKind::Processed => format!("Asset {} processed", asset_id),
                };
                TaskOutcome::Succeeded(SuccessRecord {
                    file,
                    message,
                    asset_id,
                    kind,
                    warnings: std::mem::take(&mut run.warnings),
                })
            }
            Err(error) => {
                let step = error.step();
                let from = run.task.status();
                match run.task.fail(step, error.to_string()) {
                    Ok(_) => run.emit(TaskEventKind::Transition {
                        from,
                        to: TaskStatus::Failed(step),
                    }),
                    Err(e) => tracing::error!(error = %e, file = %file, "Rejected failure transition"),
                }
                run.emit(TaskEventKind::Failed {
                    step,
                    error_code: error.error_code(),
                    error: error.to_string(),
                });
                TaskOutcome::Failed(FailureRecord::new(file, &error, run.task.asset_id()))
            }
        };

        WorkflowReport {
            task: run.task,
            outcome,
            archive: run.archive,
        }
    }

    async fn drive(
        &self,
        run: &mut TaskRun<'_>,
        cancel: &CancellationToken,
    ) -> Result<SuccessKind, WorkflowError> {
        // Metadata creation
        interrupt_check(cancel, WorkflowStep::CreateAsset)?;
        let request = CreateAssetRequest::citygml(run.task.display_name(), &run.task.file_name());
        let created = self
            .service
            .create_asset(&request)
            .await
            .map_err(|e| WorkflowError::CreateFailed(e.to_string()))?;
        let asset_id = created.asset_metadata.id;
        if let Err(e) = run.task.assign_asset_id(asset_id) {
            return Err(WorkflowError::CreateFailed(e.to_string()));
        }
        run.emit(TaskEventKind::AssetCreated { asset_id });
        run.advance(TaskStatus::MetadataCreated);

        // Storage upload
        interrupt_check(cancel, WorkflowStep::Upload)?;
        let receipt = self
            .uploader
            .upload(run.task.file_path(), &created.upload_location)
            .await
            .map_err(|e| WorkflowError::TransferFailed(e.to_string()))?;
        tracing::debug!(
            asset_id,
            bucket = %receipt.bucket,
            key = %receipt.key,
            size_bytes = receipt.size_bytes,
            "Source file transferred"
        );
        run.advance(TaskStatus::Uploaded);

        // Completion notice, exactly once
        interrupt_check(cancel, WorkflowStep::Notify)?;
        self.service
            .complete_upload(&created.on_complete)
            .await
            .map_err(|e| WorkflowError::NotifyFailed(e.to_string()))?;
        run.advance(TaskStatus::Notified);

        if !self.options.wait_for_completion {
            return Ok(SuccessKind::Initiated);
        }

        run.advance(TaskStatus::Processing);
        self.wait_for_processing(run, asset_id, cancel).await?;
        run.advance(TaskStatus::Processed);

        if self.options.create_archive {
            self.archive_and_download(run, asset_id, cancel).await;
        }

        Ok(SuccessKind::Processed)
    }

    async fn wait_for_processing(
        &self,
        run: &TaskRun<'_>,
        asset_id: AssetId,
        cancel: &CancellationToken,
    ) -> Result<AssetInfo, WorkflowError> {
        let service = &self.service;
        let outcome = poll_until(
            self.options.processing,
            cancel,
            move || async move { service.get_asset(asset_id).await.map(classify_asset) },
            |notice| run.poll_notice(WorkflowStep::Processing, notice),
        )
        .await;

        match outcome {
            PollOutcome::Ready(info) => Ok(info),
            PollOutcome::Failed(status) => Err(WorkflowError::ProcessingFailed { status }),
            PollOutcome::TimedOut(limit) => Err(WorkflowError::ProcessingTimeout(limit)),
            PollOutcome::Interrupted => Err(WorkflowError::Interrupted(WorkflowStep::Processing)),
            PollOutcome::Fatal(e) => Err(WorkflowError::StatusCheckFailed(e.to_string())),
        }
    }

    /// Runs once processing succeeded, so nothing here fails the task: archive
    /// and download errors, interruptions included, become warnings.
    async fn archive_and_download(
        &self,
        run: &mut TaskRun<'_>,
        asset_id: AssetId,
        cancel: &CancellationToken,
    ) {
        let archive = match self.build_archive(run, asset_id, cancel).await {
            Ok(info) => info,
            Err(e) => {
                run.warn(e);
                return;
            }
        };

        if !self.options.download_archive {
            return;
        }

        if let Err(e) = interrupt_check(cancel, WorkflowStep::Download) {
            run.warn(e);
            return;
        }
        run.advance(TaskStatus::Downloading);
        let file_name = match archive.name.as_deref() {
            Some(name) if !name.trim().is_empty() => archive.file_name(),
            _ => format!("{}.{}", run.task.display_name(), archive.format.extension()),
        };

        let saved = match self.service.download_archive(archive.id).await {
            Ok(download) => save_download(download, &self.options.output_dir, &file_name)
                .await
                .map_err(|e| WorkflowError::DownloadFailed(e.to_string())),
            Err(e) => Err(WorkflowError::DownloadFailed(e.to_string())),
        };

        match saved {
            Ok(saved) => {
                run.task.set_download_path(saved.path.clone());
                if let Some(record) = run.archive.as_mut() {
                    record.download_path = Some(saved.path.clone());
                }
                run.emit(TaskEventKind::Downloaded {
                    path: saved.path.display().to_string(),
                    bytes: saved.bytes,
                });
                run.advance(TaskStatus::Downloaded);
            }
            Err(e) => run.warn(e),
        }
    }

    async fn build_archive(
        &self,
        run: &mut TaskRun<'_>,
        asset_id: AssetId,
        cancel: &CancellationToken,
    ) -> Result<ArchiveInfo, WorkflowError> {
        interrupt_check(cancel, WorkflowStep::Archive)?;
        run.advance(TaskStatus::Archiving);

        let created = self
            .service
            .create_archive(asset_id)
            .await
            .map_err(|e| WorkflowError::ArchiveFailed(e.to_string()))?;
        let archive_id: ArchiveId = created.id;
        run.task.set_archive_id(archive_id);
        run.archive = Some(ArchiveRecord {
            file: run.task.file_name(),
            asset_id,
            archive_id,
            download_path: None,
        });
        run.emit(TaskEventKind::ArchiveCreated { archive_id });

        let service = &self.service;
        let observed: &TaskRun<'_> = &*run;
        let outcome = poll_until(
            self.options.archive,
            cancel,
            move || async move { service.get_archive(archive_id).await.map(classify_archive) },
            |notice| observed.poll_notice(WorkflowStep::Archive, notice),
        )
        .await;

        let info = match outcome {
            PollOutcome::Ready(info) => info,
            PollOutcome::Failed(status) => {
                return Err(WorkflowError::ArchiveFailed(format!(
                    "archive {} ended with status {}",
                    archive_id, status
                )))
            }
            PollOutcome::TimedOut(limit) => return Err(WorkflowError::ArchiveTimeout(limit)),
            PollOutcome::Interrupted => {
                return Err(WorkflowError::Interrupted(WorkflowStep::Archive))
            }
            PollOutcome::Fatal(e) => return Err(WorkflowError::ArchiveFailed(e.to_string())),
        };

        run.advance(TaskStatus::Archived);
        Ok(info)
    }
}

fn interrupt_check(cancel: &CancellationToken, step: WorkflowStep) -> Result<(), WorkflowError> {
    if cancel.is_cancelled() {
        Err(WorkflowError::Interrupted(step))
    } else {
        Ok(())
    }
}

fn classify_asset(info: AssetInfo) -> PollStep<AssetInfo> {
    match &info.status {
        AssetStatus::Complete => PollStep::Done(info),
        status if status.is_error() => PollStep::Failed(status.to_string()),
        status => PollStep::Pending {
            status: status.to_string(),
            percent_complete: info.percent_complete,
        },
    }
}

fn classify_archive(info: ArchiveInfo) -> PollStep<ArchiveInfo> {
    match &info.status {
        ArchiveStatus::Complete => PollStep::Done(info),
        ArchiveStatus::Error => PollStep::Failed(info.status.to_string()),
        status => PollStep::Pending {
            status: status.to_string(),
            percent_complete: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(status: &str, percent: Option<f64>) -> AssetInfo {
        serde_json::from_value(json!({
            "id": 1,
            "status": status,
            "percentComplete": percent
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_asset() {
        assert!(matches!(classify_asset(asset("COMPLETE", None)), PollStep::Done(_)));
        assert!(matches!(
            classify_asset(asset("DATA_ERROR", None)),
            PollStep::Failed(s) if s == "DATA_ERROR"
        ));
        assert!(matches!(
            classify_asset(asset("SOMETHING_NEW", Some(10.0))),
            PollStep::Pending { percent_complete: Some(p), .. } if p == 10.0
        ));
    }

    #[test]
    fn test_classify_archive() {
        let info: ArchiveInfo =
            serde_json::from_value(json!({ "id": 2, "status": "ERROR" })).unwrap();
        assert!(matches!(classify_archive(info), PollStep::Failed(_)));
        let info: ArchiveInfo = serde_json::from_value(json!({ "id": 2 })).unwrap();
        assert!(matches!(classify_archive(info), PollStep::Pending { .. }));
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = UploaderConfig::with_token("t");
        config.wait_for_completion = true;
        config.processing_poll_interval_secs = 2;
        let options = WorkflowOptions::from_config(&config);
        assert!(options.wait_for_completion);
        assert_eq!(options.processing.interval, std::time::Duration::from_secs(2));
        assert_eq!(options.archive.timeout, std::time::Duration::from_secs(300));
    }
}
