//! Run report: immutable snapshot of one pipeline run.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ItemKey, ItemStatus};

/// Terminal outcome of one item, as recorded in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Natural key of the item.
    pub key: ItemKey,
    /// Final status for this run.
    pub status: ItemStatus,
    /// Failure or rejection reason, when applicable.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Counts per final status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Items that completed all stages.
    pub completed: usize,
    /// Items excluded by a quality gate.
    pub rejected: usize,
    /// Items that failed processing.
    pub failed: usize,
    /// Items skipped because their fingerprint was already committed.
    pub skipped_duplicate: usize,
    /// Items a cancelled run never dispatched; resumable next run.
    pub pending: usize,
}

/// Snapshot of a completed (or cancelled) run.
///
/// Created when the run loop terminates and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Elapsed wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// Whether the run was cancelled before all items settled.
    pub cancelled: bool,
    /// Counts per final status.
    pub counts: StatusCounts,
    /// Every item's outcome, in batch order.
    pub items: Vec<ItemOutcome>,
}

impl RunReport {
    /// Finalizes a report from per-item outcomes.
    pub fn finalize(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        cancelled: bool,
        items: Vec<ItemOutcome>,
    ) -> Self {
        let mut counts = StatusCounts::default();
        for item in &items {
            match item.status {
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Rejected => counts.rejected += 1,
                ItemStatus::Failed => counts.failed += 1,
                ItemStatus::SkippedDuplicate => counts.skipped_duplicate += 1,
                ItemStatus::Pending | ItemStatus::InProgress => counts.pending += 1,
            }
        }

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms,
            cancelled,
            counts,
            items,
        }
    }

    /// Total number of items in the batch.
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// True when at least one item failed. A warning-level outcome for
    /// the run, never a hard failure of the orchestration process.
    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// Failed items with their reasons.
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
    }

    /// Items skipped as duplicates.
    pub fn skipped_duplicates(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::SkippedDuplicate)
    }

    /// Writes the report as pretty JSON for audit.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, data)
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "run {}: {} items in {}ms (completed={}, rejected={}, failed={}, duplicates={}, pending={}){}",
            self.run_id,
            self.total_items(),
            self.elapsed_ms,
            self.counts.completed,
            self.counts.rejected,
            self.counts.failed,
            self.counts.skipped_duplicate,
            self.counts.pending,
            if self.cancelled { " [cancelled]" } else { "" },
        )
    }
}
