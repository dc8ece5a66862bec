//! Task executor: collaborator dispatch, timeout and retry.
//!
//! The executor converts collaborator-level failures into a uniform
//! `TaskOutcome`. It holds no item state; the only per-call state is the
//! attempt counter, which is reported back on the outcome.

pub mod retry;

use std::time::Duration;

use tracing::{debug, warn};

use crate::connectors::CollaboratorSet;
use crate::error::CollaboratorError;
use crate::model::{StageInput, StagePayload, Task, TaskOutcome};

pub use retry::RetryPolicy;

/// Default wall-clock limit on one collaborator call.
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Executes tasks against the collaborator bound to their stage.
#[derive(Clone)]
pub struct TaskExecutor {
    collaborators: CollaboratorSet,
    retry: RetryPolicy,
    timeout: Duration,
}

impl TaskExecutor {
    /// Creates an executor with the default retry policy and timeout.
    pub fn new(collaborators: CollaboratorSet) -> Self {
        Self {
            collaborators,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one task to a uniform outcome.
    ///
    /// Transient failures (including timeouts) consume retry budget with
    /// exponential backoff; permanent failures return immediately. After
    /// the budget is exhausted the last error is preserved verbatim.
    pub async fn execute(&self, task: &Task, input: StageInput) -> TaskOutcome {
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let error = match tokio::time::timeout(self.timeout, self.dispatch(&input)).await {
                Ok(Ok(payload)) => {
                    debug!(task = %task.label(), attempts, "task succeeded");
                    return TaskOutcome::succeeded(payload, attempts);
                }
                Ok(Err(error)) => error,
                Err(_) => CollaboratorError::transient(format!(
                    "collaborator call timed out after {:?}",
                    self.timeout
                )),
            };

            if !error.is_transient() || attempts >= self.retry.max_attempts {
                warn!(
                    task = %task.label(),
                    attempts,
                    error = %error,
                    "task failed"
                );
                return TaskOutcome::failed(error.to_string(), attempts);
            }

            let delay = self.retry.delay_for(attempts);
            debug!(
                task = %task.label(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Invokes the collaborator bound to the input's stage.
    async fn dispatch(&self, input: &StageInput) -> Result<StagePayload, CollaboratorError> {
        match input {
            StageInput::Acquire(key) => self
                .collaborators
                .source
                .fetch(key)
                .await
                .map(StagePayload::Raw),
            StageInput::Parse(raw) => self
                .collaborators
                .parser
                .parse(raw)
                .await
                .map(StagePayload::Document),
            StageInput::Classify(document) => self
                .collaborators
                .tagger
                .classify(document)
                .await
                .map(StagePayload::Labels),
            StageInput::Persist {
                key,
                document,
                labels,
            } => self
                .collaborators
                .storage
                .persist(key, document, labels)
                .await
                .map(|()| StagePayload::Persisted),
        }
    }
}
