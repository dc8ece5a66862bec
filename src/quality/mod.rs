//! Quality gates: predicate chains deciding whether an item's output may
//! proceed to the next stage.
//!
//! A gate is a pure predicate over a stage's output payload plus a
//! human-readable rejection reason. Gates are composed into an ordered
//! chain per stage; the chain stops at the first failing gate. Rejection
//! is an expected, non-exceptional outcome ("bad input"), kept strictly
//! apart from `failed` ("system malfunction") in the run report.

pub mod gates;

use crate::model::{Stage, StagePayload};

pub use gates::{ExcludedCategories, MinAbstractLength, RequireTitle};

/// Verdict of a gate or gate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    /// Whether the payload may proceed.
    pub passed: bool,
    /// Rejection reason when `passed` is false; cites the gate name.
    pub reason: Option<String>,
}

impl GateResult {
    /// A passing verdict.
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    /// A rejecting verdict with a reason.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// A pure predicate over one stage's output payload.
pub trait QualityGate: Send + Sync {
    /// Name cited in rejection reasons and the run report.
    fn name(&self) -> &str;

    /// Stage whose output this gate inspects.
    fn stage(&self) -> Stage;

    /// Checks the payload.
    fn check(&self, payload: &StagePayload) -> GateResult;
}

/// Ordered chain of gates, applied per stage.
#[derive(Default)]
pub struct GateChain {
    gates: Vec<Box<dyn QualityGate>>,
}

impl GateChain {
    /// Creates an empty chain (everything passes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a gate to the chain.
    pub fn with_gate(mut self, gate: Box<dyn QualityGate>) -> Self {
        self.gates.push(gate);
        self
    }

    /// Number of gates registered for `stage`.
    pub fn gates_for(&self, stage: Stage) -> usize {
        self.gates.iter().filter(|g| g.stage() == stage).count()
    }

    /// Applies every gate registered for `stage`, in order, stopping at
    /// the first rejection.
    pub fn apply(&self, stage: Stage, payload: &StagePayload) -> GateResult {
        for gate in self.gates.iter().filter(|g| g.stage() == stage) {
            let result = gate.check(payload);
            if !result.passed {
                return result;
            }
        }
        GateResult::pass()
    }
}
