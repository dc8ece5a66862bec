//! Pipeline orchestrator: owns one run from batch admission to report.
//!
//! The orchestrator builds the dependency graph for a batch of item keys,
//! drives execution to completion through the task executor, applies
//! quality gates to successful outputs, consults and updates the
//! deduplication index at the Acquire/Persist boundaries, and aggregates
//! everything into a run report.
//!
//! Concurrency discipline: collaborator calls run in parallel on a
//! `JoinSet`, but a task is spawned only once the coordinator holds a
//! semaphore permit for it, so at most pool-size tasks are running at any
//! instant and everything else stays undispatched. All graph and
//! item-state mutation happens in this coordinator loop; that
//! single-writer rule is the only shared-mutable-state boundary in the
//! design.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectors::CollaboratorSet;
use crate::dedup::{DedupIndex, IndexError};
use crate::error::GraphError;
use crate::executor::TaskExecutor;
use crate::graph::DependencyGraph;
use crate::model::{
    ItemKey, ItemStatus, Labels, RawContent, Stage, StageInput, StagePayload, StructuredDocument,
    TaskOutcome, TaskStatus,
};
use crate::quality::GateChain;

use super::config::{ConfigError, PipelineConfig};
use super::report::{ItemOutcome, RunReport};

/// Errors that can occur during pipeline operations.
///
/// Per-task collaborator failures never surface here; they become
/// item-level `failed` statuses in the report. These errors mean the run
/// itself could not proceed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Structurally invalid pipeline definition; raised before dispatch.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Deduplication index failure.
    #[error("dedup index error: {0}")]
    Index(#[from] IndexError),

    /// The run report could not be written.
    #[error("failed to write run report: {0}")]
    ReportWrite(#[from] std::io::Error),

    /// A worker task panicked; indicates a bug in a collaborator.
    #[error("worker panicked: {0}")]
    Worker(String),
}

/// Handle for signalling run-level cancellation.
///
/// Cancellation stops dispatching new ready tasks; in-flight tasks
/// finish (or hit their own timeout), then the run finalizes a partial
/// report with undispatched items left `pending` so a future run can
/// resume them.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Mutable per-item state, owned exclusively by the coordinator loop for
/// the duration of a run.
#[derive(Debug, Default)]
struct ItemState {
    status: Option<ItemStatus>,
    reason: Option<String>,
    raw: Option<RawContent>,
    document: Option<StructuredDocument>,
    labels: Option<Labels>,
}

impl ItemState {
    fn settle(&mut self, status: ItemStatus, reason: Option<String>) {
        self.status = Some(status);
        self.reason = reason;
    }
}

/// Coordinates a batch of items through the pipeline stages.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    executor: TaskExecutor,
    index: Arc<dyn DedupIndex>,
    gates: GateChain,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator.
    ///
    /// Collaborators are selected by the caller (configuration), one
    /// implementation per stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration does not
    /// validate or a gate pattern does not compile.
    pub fn new(
        config: PipelineConfig,
        collaborators: CollaboratorSet,
        index: Arc<dyn DedupIndex>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let gates = config.gate_chain()?;
        let executor = TaskExecutor::new(collaborators)
            .with_retry_policy(config.retry_policy())
            .with_timeout(config.task_timeout);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Self {
            config,
            executor,
            index,
            gates,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    /// Returns a handle that cancels the current (or next) run.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Gets the current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs a batch of items to a finalized report.
    ///
    /// For a fixed input set and fixed collaborator responses the
    /// per-item terminal statuses are identical across runs regardless
    /// of completion order: each item's chain is strictly ordered and
    /// cross-item interleaving cannot affect a single item's outcome.
    pub async fn run(&self, keys: Vec<ItemKey>) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(run_id = %run_id, items = keys.len(), "starting pipeline run");

        // Admission: consult the dedup index before any Acquire task
        // exists. Committed fingerprints never re-enter the pipeline.
        let mut states: HashMap<ItemKey, ItemState> = HashMap::new();
        let mut admitted: Vec<ItemKey> = Vec::new();
        for key in &keys {
            let mut state = ItemState::default();
            if self.index.seen(&key.fingerprint())? {
                debug!(item = %key, "skipping duplicate");
                state.settle(ItemStatus::SkippedDuplicate, None);
            } else {
                admitted.push(key.clone());
            }
            states.insert(key.clone(), state);
        }

        // GraphError aborts here, before any task executes.
        let mut graph = DependencyGraph::build(&admitted)?;
        graph.seal()?;

        self.drive(&mut graph, &mut states).await?;

        let cancelled = *self.cancel_rx.borrow();
        let items = keys
            .iter()
            .map(|key| {
                let state = &states[key];
                ItemOutcome {
                    key: key.clone(),
                    status: state.status.unwrap_or(ItemStatus::Pending),
                    reason: state.reason.clone(),
                }
            })
            .collect();

        let report = RunReport::finalize(
            run_id,
            started_at,
            clock.elapsed().as_millis() as u64,
            cancelled,
            items,
        );

        if let Some(path) = &self.config.report_path {
            report.write_to(path)?;
        }

        if report.has_failures() {
            warn!(run_id = %run_id, failed = report.counts.failed, "{}", report.summary());
        } else {
            info!(run_id = %run_id, "{}", report.summary());
        }
        Ok(report)
    }

    /// Event loop: dispatch ready tasks, await completions, mark the
    /// graph. Terminates when no task is pending, ready or running.
    ///
    /// A task is spawned only when the coordinator has an owned permit
    /// for it. Ready tasks beyond the pool size wait in `queued`, never
    /// reach a collaborator, and are therefore genuinely undispatched if
    /// the run is cancelled in the meantime.
    async fn drive(
        &self,
        graph: &mut DependencyGraph,
        states: &mut HashMap<ItemKey, ItemState>,
    ) -> Result<(), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tasks));
        let mut in_flight: JoinSet<(Uuid, ItemKey, Stage, TaskOutcome)> = JoinSet::new();
        let mut queued: VecDeque<Uuid> = VecDeque::new();

        loop {
            let cancelled = *self.cancel_rx.borrow();

            if !cancelled {
                queued.extend(graph.ready_set());

                while let Some(&id) = queued.front() {
                    let Some(task) = graph.task(id) else {
                        queued.pop_front();
                        continue;
                    };
                    // A failed upstream may have skipped a queued task.
                    if task.status != TaskStatus::Ready {
                        queued.pop_front();
                        continue;
                    }
                    let task = task.clone();

                    let state = states.entry(task.item.clone()).or_default();
                    let Some(input) = stage_input(&task.item, task.stage, state) else {
                        // An upstream payload is missing even though the
                        // graph says the dependency succeeded.
                        let outcome =
                            TaskOutcome::failed("internal: missing upstream payload", 0);
                        state.settle(ItemStatus::Failed, outcome.error.clone());
                        graph.mark_running(id);
                        graph.mark(id, &outcome);
                        queued.pop_front();
                        continue;
                    };

                    // Pool is full; the task stays queued and undispatched.
                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        break;
                    };
                    queued.pop_front();

                    graph.mark_running(id);
                    state.status = Some(ItemStatus::InProgress);

                    let executor = self.executor.clone();
                    debug!(task = %task.label(), "dispatching task");
                    in_flight.spawn(async move {
                        let _permit = permit;
                        let outcome = executor.execute(&task, input).await;
                        (task.id, task.item, task.stage, outcome)
                    });
                }
            }

            if in_flight.is_empty() && (cancelled || graph.is_settled()) {
                break;
            }

            match in_flight.join_next().await {
                Some(Ok((id, key, stage, outcome))) => {
                    self.settle_task(graph, states, id, key, stage, outcome);
                }
                Some(Err(e)) => return Err(PipelineError::Worker(e.to_string())),
                None => {
                    // Nothing in flight and nothing dispatched: the graph
                    // is settled or dispatch is suppressed by
                    // cancellation; the checks above end the loop.
                    if *self.cancel_rx.borrow() || graph.is_settled() {
                        break;
                    }
                }
            }
        }

        // Anything the loop never settled (cancelled before dispatch)
        // stays pending so a future run resumes it.
        for state in states.values_mut() {
            match state.status {
                Some(status) if status.is_terminal() => {}
                _ => state.settle(ItemStatus::Pending, None),
            }
        }
        Ok(())
    }

    /// Applies gates and records one task's outcome. Runs on the
    /// coordinator only.
    fn settle_task(
        &self,
        graph: &mut DependencyGraph,
        states: &mut HashMap<ItemKey, ItemState>,
        id: Uuid,
        key: ItemKey,
        stage: Stage,
        outcome: TaskOutcome,
    ) {
        let state = states.entry(key.clone()).or_default();

        if !outcome.succeeded {
            let reason = outcome
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            warn!(item = %key, stage = %stage, reason = %reason, "item failed");
            state.settle(ItemStatus::Failed, Some(reason));
            graph.mark(id, &outcome);
            return;
        }

        let payload = outcome
            .payload
            .clone()
            .unwrap_or(StagePayload::Persisted);

        // Quality gates inspect successful output before the item may
        // advance. Rejection is terminal but distinct from failure.
        let verdict = self.gates.apply(stage, &payload);
        if !verdict.passed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "rejected by quality gate".to_string());
            info!(item = %key, stage = %stage, reason = %reason, "item rejected");
            state.settle(ItemStatus::Rejected, Some(reason.clone()));
            // Not a success as far as the graph is concerned: the rest
            // of the chain is skipped.
            let rejection = TaskOutcome {
                succeeded: false,
                payload: None,
                error: Some(reason),
                attempts: outcome.attempts,
            };
            graph.mark(id, &rejection);
            return;
        }

        match payload {
            StagePayload::Raw(raw) => state.raw = Some(raw),
            StagePayload::Document(document) => state.document = Some(document),
            StagePayload::Labels(labels) => state.labels = Some(labels),
            StagePayload::Persisted => {}
        }

        if stage == Stage::Persist {
            state.settle(ItemStatus::Completed, None);
            // Persist is the durability boundary; only now does the
            // fingerprint become a duplicate for future runs. A failed
            // commit costs at most one reprocess next run.
            if let Err(e) = self.index.commit(&key.fingerprint(), &key) {
                warn!(item = %key, error = %e, "failed to commit fingerprint");
            }
            debug!(item = %key, "item completed");
        }

        graph.mark(id, &outcome);
    }
}

/// Assembles the executor input for a stage from the item's previously
/// completed stages.
fn stage_input(key: &ItemKey, stage: Stage, state: &ItemState) -> Option<StageInput> {
    match stage {
        Stage::Acquire => Some(StageInput::Acquire(key.clone())),
        Stage::Parse => state.raw.clone().map(StageInput::Parse),
        Stage::Classify => state.document.clone().map(StageInput::Classify),
        Stage::Persist => match (state.document.clone(), state.labels.clone()) {
            (Some(document), Some(labels)) => Some(StageInput::Persist {
                key: key.clone(),
                document,
                labels,
            }),
            _ => None,
        },
    }
}
