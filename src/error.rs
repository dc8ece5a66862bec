//! Shared error taxonomy for pipeline operations.
//!
//! Two error families cross module boundaries and live here:
//!
//! - `CollaboratorError`: failures surfaced by external collaborators
//!   (source connectors, parsers, taggers, storage), split into transient
//!   (retry-eligible) and permanent (not retryable).
//! - `GraphError`: structural problems in the dependency graph. These are
//!   configuration errors, fatal to a run, and raised before any task
//!   executes.
//!
//! Subsystem-local errors (`ConfigError`, `IndexError`, `PipelineError`)
//! are defined next to the code that produces them.

use thiserror::Error;

/// Errors surfaced by external collaborators.
///
/// Every collaborator call must be classifiable into transient vs
/// permanent so the task executor can decide whether a retry is worth
/// spending budget on. Network errors, rate limits and timeouts are
/// transient; malformed content and validation failures are permanent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Retry-eligible failure (network error, rate limit, timeout).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Non-retryable failure (malformed input, validation failure).
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl CollaboratorError {
    /// Creates a transient error from any displayable cause.
    pub fn transient(cause: impl std::fmt::Display) -> Self {
        Self::Transient(cause.to_string())
    }

    /// Creates a permanent error from any displayable cause.
    pub fn permanent(cause: impl std::fmt::Display) -> Self {
        Self::Permanent(cause.to_string())
    }

    /// Returns true if the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors that can occur while building or sealing the dependency graph.
///
/// Any of these indicates a structurally invalid pipeline definition and
/// aborts the entire run before dispatch.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A dependency cycle was introduced by a cross-item override.
    #[error("dependency cycle detected involving task '{0}'")]
    Cycle(String),

    /// An edge references a task that does not exist in the graph.
    #[error("unknown task '{0}' referenced as a dependency")]
    UnknownTask(String),

    /// The same item key was admitted twice into one run.
    #[error("item '{0}' was added to the graph more than once")]
    DuplicateItem(String),
}
