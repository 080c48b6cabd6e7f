//! Thread-safe collection of task outcomes.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Mutex;

use serde::Serialize;
use tilepush_core::models::{
    ArchiveRecord, AssetId, FailureRecord, SuccessKind, SuccessRecord, TaskOutcome,
};

/// Outcomes of a batch, in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub successes: Vec<SuccessRecord>,
    pub failures: Vec<FailureRecord>,
    pub archives: Vec<ArchiveRecord>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn count_of(&self, kind: SuccessKind) -> usize {
        self.successes.iter().filter(|s| s.kind == kind).count()
    }

    /// Successes that carry archive or download warnings.
    pub fn degraded(&self) -> impl Iterator<Item = &SuccessRecord> {
        self.successes.iter().filter(|s| s.is_degraded())
    }

    /// Asset ids of successful tasks, in completion order.
    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.successes.iter().map(|s| s.asset_id).collect()
    }

    pub fn is_full_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Display for BatchResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "UPLOAD SUMMARY")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Total files processed: {}", self.total())?;
        writeln!(
            f,
            "Successful uploads: {} ({} processed, {} initiated)",
            self.success_count(),
            self.count_of(SuccessKind::Processed),
            self.count_of(SuccessKind::Initiated)
        )?;
        writeln!(f, "Failed uploads: {}", self.failure_count())?;

        if !self.successes.is_empty() {
            writeln!(f)?;
            writeln!(f, "SUCCESSFUL UPLOADS:")?;
            writeln!(f, "{}", "-".repeat(40))?;
            for item in &self.successes {
                writeln!(f, "  • {}: {} [{}]", item.file, item.message, item.kind)?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "FAILED UPLOADS:")?;
            writeln!(f, "{}", "-".repeat(40))?;
            for item in &self.failures {
                match item.asset_id {
                    Some(id) => writeln!(
                        f,
                        "  • {} (asset {}): [{}] {}",
                        item.file, id, item.error_code, item.error
                    )?,
                    None => writeln!(f, "  • {}: [{}] {}", item.file, item.error_code, item.error)?,
                }
            }
        }

        let degraded: Vec<_> = self.degraded().collect();
        if !degraded.is_empty() {
            writeln!(f)?;
            writeln!(f, "WARNINGS (uploaded, but archive or download incomplete):")?;
            writeln!(f, "{}", "-".repeat(40))?;
            for item in degraded {
                for warning in &item.warnings {
                    writeln!(f, "  ! {} (asset {}): {}", item.file, item.asset_id, warning)?;
                }
            }
        }

        if !self.archives.is_empty() {
            writeln!(f)?;
            writeln!(f, "ARCHIVES:")?;
            writeln!(f, "{}", "-".repeat(40))?;
            for item in &self.archives {
                match &item.download_path {
                    Some(path) => writeln!(
                        f,
                        "  • {} → archive {} saved to {}",
                        item.file,
                        item.archive_id,
                        path.display()
                    )?,
                    None => writeln!(
                        f,
                        "  • {} → archive {} (not downloaded)",
                        item.file, item.archive_id
                    )?,
                }
            }
        }

        write!(f, "{}", rule)
    }
}

/// Append-only, shared between workers. No deduplication.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    inner: Mutex<BatchResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: TaskOutcome, archive: Option<ArchiveRecord>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match outcome {
            TaskOutcome::Succeeded(record) => inner.successes.push(record),
            TaskOutcome::Failed(record) => inner.failures.push(record),
        }
        if let Some(archive) = archive {
            inner.archives.push(archive);
        }
    }

    pub fn snapshot(&self) -> BatchResult {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn into_result(self) -> BatchResult {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilepush_core::models::WorkflowStep;

    fn success(file: &str, id: AssetId, kind: SuccessKind, warnings: Vec<String>) -> TaskOutcome {
        TaskOutcome::Succeeded(SuccessRecord {
            file: file.to_string(),
            message: format!("Asset {} processed", id),
            asset_id: id,
            kind,
            warnings,
        })
    }

    fn failure(file: &str, asset_id: Option<AssetId>) -> TaskOutcome {
        TaskOutcome::Failed(FailureRecord {
            file: file.to_string(),
            step: WorkflowStep::Upload,
            error: "Transfer to object storage failed: denied".to_string(),
            error_code: "TRANSFER_FAILED",
            asset_id,
        })
    }

    #[test]
    fn test_counts_and_asset_ids() {
        let aggregator = ResultAggregator::new();
        aggregator.record(success("a.gml", 1, SuccessKind::Processed, vec![]), None);
        aggregator.record(failure("b.gml", Some(2)), None);
        aggregator.record(success("c.gml", 3, SuccessKind::Initiated, vec![]), None);

        let result = aggregator.into_result();
        assert_eq!(result.total(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.count_of(SuccessKind::Processed), 1);
        assert_eq!(result.asset_ids(), vec![1, 3]);
        assert!(!result.is_full_success());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let aggregator = ResultAggregator::new();
        aggregator.record(success("a.gml", 1, SuccessKind::Initiated, vec![]), None);
        aggregator.record(success("a.gml", 1, SuccessKind::Initiated, vec![]), None);
        assert_eq!(aggregator.snapshot().success_count(), 2);
    }

    #[test]
    fn test_summary_lists_failures_and_warnings() {
        let aggregator = ResultAggregator::new();
        aggregator.record(
            success(
                "a.gml",
                1,
                SuccessKind::Processed,
                vec!["Archive did not finish within 300s".to_string()],
            ),
            Some(ArchiveRecord {
                file: "a.gml".to_string(),
                asset_id: 1,
                archive_id: 9,
                download_path: None,
            }),
        );
        aggregator.record(failure("b.gml", Some(2)), None);

        let summary = aggregator.snapshot().to_string();
        assert!(summary.contains("Total files processed: 2"));
        assert!(summary.contains("b.gml (asset 2): [TRANSFER_FAILED]"));
        assert!(summary.contains("WARNINGS"));
        assert!(summary.contains("archive 9 (not downloaded)"));
    }
}
