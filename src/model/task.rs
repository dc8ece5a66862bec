//! Task types: one stage's unit of work for one item.
//!
//! Tasks exist only for the duration of a run; only item-level outcomes
//! survive in the run report and the deduplication index.

use uuid::Uuid;

use super::document::StagePayload;
use super::item::{ItemKey, Stage};

/// Status of a task inside the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for upstream tasks.
    Pending,
    /// All upstream tasks succeeded; eligible for dispatch.
    Ready,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished unsuccessfully (executor failure or gate rejection).
    Failed,
    /// Will never run because an upstream task did not succeed.
    Skipped,
}

impl TaskStatus {
    /// Returns true when the task will not transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// One stage's unit of work for one item.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique identifier within the run.
    pub id: Uuid,
    /// The stage this task executes.
    pub stage: Stage,
    /// Key of the owning item.
    pub item: ItemKey,
    /// Upstream task ids that must all succeed first.
    pub depends_on: Vec<Uuid>,
    /// Current status.
    pub status: TaskStatus,
    /// Number of attempts the executor made (filled in on completion).
    pub attempts: u32,
    /// Last error, if any attempt failed.
    pub last_error: Option<String>,
}

impl Task {
    /// Creates a pending task for the given item and stage.
    pub fn new(item: ItemKey, stage: Stage, depends_on: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            item,
            depends_on,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// Human-readable label for logs (`<item>:<stage>`).
    pub fn label(&self) -> String {
        format!("{}:{}", self.item, self.stage)
    }
}

/// Uniform result of executing one task, regardless of which
/// collaborator ran underneath.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Whether the task succeeded.
    pub succeeded: bool,
    /// Output payload on success.
    pub payload: Option<StagePayload>,
    /// Error message on failure, preserved verbatim for the report.
    pub error: Option<String>,
    /// Attempts consumed, including the final one.
    pub attempts: u32,
}

impl TaskOutcome {
    /// Creates a successful outcome.
    pub fn succeeded(payload: StagePayload, attempts: u32) -> Self {
        Self {
            succeeded: true,
            payload: Some(payload),
            error: None,
            attempts,
        }
    }

    /// Creates a failed outcome.
    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            succeeded: false,
            payload: None,
            error: Some(error.into()),
            attempts,
        }
    }
}
