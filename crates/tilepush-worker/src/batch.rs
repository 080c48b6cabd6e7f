//! Bounded concurrent batch runner.
//!
//! Every file gets its own tokio task; a semaphore with `concurrency` permits
//! bounds how many workflows are in flight. A task holds its permit for its
//! whole workflow, polling sleeps included. Cancelling the token stops
//! polling loops and keeps queued tasks from starting; both are recorded as
//! `Interrupted` failures so every submitted file still gets one outcome.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tilepush_core::models::{FailureRecord, TaskOutcome, WorkflowStep};
use tilepush_core::WorkflowError;

use crate::results::{BatchResult, ResultAggregator};
use crate::workflow::{AssetWorkflow, WorkflowReport};

pub struct BatchRunner {
    workflow: AssetWorkflow,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// `concurrency` of zero is treated as one.
    pub fn new(workflow: AssetWorkflow, concurrency: usize) -> Self {
        Self {
            workflow,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one tied to Ctrl+C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the workflow for every file and collect the outcomes in completion order.
    pub async fn run(&self, files: Vec<PathBuf>) -> BatchResult {
        let run_id = Uuid::new_v4();
        let total = files.len();
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let aggregator = Arc::new(ResultAggregator::new());

        tracing::info!(
            run_id = %run_id,
            files = total,
            concurrency = self.concurrency,
            wait = self.workflow.options().wait_for_completion,
            archive = self.workflow.options().create_archive,
            download = self.workflow.options().download_archive,
            "Batch started"
        );

        let mut join_set = JoinSet::new();
        let mut spawned = HashMap::with_capacity(total);
        for (index, file_path) in files.into_iter().enumerate() {
            let file = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.display().to_string());
            let workflow = self.workflow.clone();
            let semaphore = semaphore.clone();
            let aggregator = aggregator.clone();
            let cancel = self.cancel.clone();

            let handle = join_set.spawn(async move {
                let report: WorkflowReport = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => workflow.interrupted_before_start(index, file_path),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(_permit) => workflow.run(index, file_path, &cancel).await,
                        Err(_) => workflow.interrupted_before_start(index, file_path),
                    },
                };
                aggregator.record(report.outcome, report.archive);
            });
            spawned.insert(handle.id(), file);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            if let Err(e) = joined {
                // A panicked workflow still counts as one failure for its file.
                let file = spawned
                    .remove(&e.id())
                    .unwrap_or_else(|| format!("<task {}>", e.id()));
                tracing::error!(run_id = %run_id, file = %file, error = %e, "Upload task aborted");
                let error = WorkflowError::Interrupted(WorkflowStep::CreateAsset);
                aggregator.record(
                    TaskOutcome::Failed(FailureRecord::new(file, &error, None)),
                    None,
                );
            }
        }

        let result = match Arc::try_unwrap(aggregator) {
            Ok(aggregator) => aggregator.into_result(),
            Err(shared) => shared.snapshot(),
        };

        tracing::info!(
            run_id = %run_id,
            total = result.total(),
            succeeded = result.success_count(),
            failed = result.failure_count(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch finished"
        );

        result
    }
}
