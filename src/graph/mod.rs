//! Dependency graph over pipeline tasks.
//!
//! The graph owns one Acquire → Parse → Classify → Persist chain per
//! admitted item. Chains are disjoint and acyclic by construction; a
//! cycle can only be introduced through an explicit cross-item dependency
//! override, which `seal` rejects before any task is dispatched.
//!
//! The orchestrator is the single writer: `ready_set`, `mark_running` and
//! `mark` are called from its coordinator loop only, never concurrently.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::error::GraphError;
use crate::model::{ItemKey, Stage, Task, TaskOutcome, TaskStatus};

/// Directed acyclic graph of tasks for one run.
#[derive(Debug)]
pub struct DependencyGraph {
    tasks: HashMap<Uuid, Task>,
    /// Insertion order (batch order x stage order); makes ready sets and
    /// dispatch deterministic.
    order: Vec<Uuid>,
    /// Reverse edges: task id -> ids of tasks depending on it.
    dependents: HashMap<Uuid, Vec<Uuid>>,
    sealed: bool,
}

impl DependencyGraph {
    /// Builds one linear stage chain per item.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateItem` if the same key appears twice
    /// in the batch.
    pub fn build(keys: &[ItemKey]) -> Result<Self, GraphError> {
        let mut graph = Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            dependents: HashMap::new(),
            sealed: false,
        };

        let mut admitted: HashSet<&ItemKey> = HashSet::new();
        for key in keys {
            if !admitted.insert(key) {
                return Err(GraphError::DuplicateItem(key.to_string()));
            }

            let mut previous: Option<Uuid> = None;
            for stage in Stage::ORDER {
                let depends_on = previous.into_iter().collect();
                let task = Task::new(key.clone(), stage, depends_on);
                let id = task.id;

                if let Some(upstream) = previous {
                    graph.dependents.entry(upstream).or_default().push(id);
                }
                graph.order.push(id);
                graph.tasks.insert(id, task);
                previous = Some(id);
            }
        }

        Ok(graph)
    }

    /// Declares an extra dependency edge (cross-item overrides).
    ///
    /// Must be called before `seal`.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownTask` if either endpoint is not in the
    /// graph.
    pub fn add_dependency(&mut self, task: Uuid, upstream: Uuid) -> Result<(), GraphError> {
        if !self.tasks.contains_key(&upstream) {
            return Err(GraphError::UnknownTask(upstream.to_string()));
        }
        let node = self
            .tasks
            .get_mut(&task)
            .ok_or_else(|| GraphError::UnknownTask(task.to_string()))?;
        node.depends_on.push(upstream);
        self.dependents.entry(upstream).or_default().push(task);
        Ok(())
    }

    /// Validates the graph and freezes its structure.
    ///
    /// Runs Kahn's algorithm over all edges; anything left over sits on a
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::Cycle` naming one task on the cycle.
    pub fn seal(&mut self) -> Result<(), GraphError> {
        let mut indegree: HashMap<Uuid, usize> = self
            .tasks
            .iter()
            .map(|(id, task)| (*id, task.depends_on.len()))
            .collect();

        let mut queue: VecDeque<Uuid> = self
            .order
            .iter()
            .copied()
            .filter(|id| indegree[id] == 0)
            .collect();

        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for dependent in self.dependents.get(&id).into_iter().flatten() {
                let remaining = indegree
                    .get_mut(dependent)
                    .expect("dependent edges only reference known tasks");
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(*dependent);
                }
            }
        }

        if visited != self.tasks.len() {
            let stuck = self
                .order
                .iter()
                .find(|id| indegree[*id] > 0)
                .expect("an unvisited task must have remaining indegree");
            let label = self.tasks[stuck].label();
            return Err(GraphError::Cycle(label));
        }

        self.sealed = true;
        Ok(())
    }

    /// Returns tasks whose upstream tasks have all succeeded and which
    /// are themselves still pending, promoting them to `Ready`.
    ///
    /// Order is deterministic (insertion order).
    pub fn ready_set(&mut self) -> Vec<Uuid> {
        debug_assert!(self.sealed, "ready_set called on an unsealed graph");

        let ready: Vec<Uuid> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                let task = &self.tasks[id];
                task.status == TaskStatus::Pending
                    && task
                        .depends_on
                        .iter()
                        .all(|dep| self.tasks[dep].status == TaskStatus::Succeeded)
            })
            .collect();

        for id in &ready {
            if let Some(task) = self.tasks.get_mut(id) {
                task.status = TaskStatus::Ready;
            }
        }
        ready
    }

    /// Transitions a ready task to running at dispatch time.
    pub fn mark_running(&mut self, id: Uuid) {
        if let Some(task) = self.tasks.get_mut(&id) {
            debug_assert_eq!(task.status, TaskStatus::Ready);
            task.status = TaskStatus::Running;
        }
    }

    /// Records a task outcome.
    ///
    /// On a non-success, every transitive downstream task that has not
    /// run yet is marked `Skipped` so it never blocks the run loop: one
    /// stage's failure short-circuits the remainder of that item's chain
    /// without affecting other items.
    pub fn mark(&mut self, id: Uuid, outcome: &TaskOutcome) {
        let succeeded = outcome.succeeded;
        if let Some(task) = self.tasks.get_mut(&id) {
            task.status = if succeeded {
                TaskStatus::Succeeded
            } else {
                TaskStatus::Failed
            };
            task.attempts = outcome.attempts;
            task.last_error = outcome.error.clone();
        }

        if !succeeded {
            self.skip_downstream(id);
        }
    }

    /// Marks all transitive dependents of `id` as skipped.
    fn skip_downstream(&mut self, id: Uuid) {
        let mut queue: VecDeque<Uuid> = self
            .dependents
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .collect();

        while let Some(next) = queue.pop_front() {
            let task = match self.tasks.get_mut(&next) {
                Some(task) if !task.status.is_terminal() => task,
                _ => continue,
            };
            task.status = TaskStatus::Skipped;
            queue.extend(self.dependents.get(&next).into_iter().flatten().copied());
        }
    }

    /// Returns true when no task is pending, ready or running.
    pub fn is_settled(&self) -> bool {
        self.tasks.values().all(|task| task.status.is_terminal())
    }

    /// Looks up a task by id.
    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Returns the item's tasks in stage order.
    pub fn tasks_for_item(&self, key: &ItemKey) -> Vec<&Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|task| &task.item == key)
            .collect()
    }

    /// Total number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when the graph has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks currently in the given status.
    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }
}
