//! Core data model for the ingestion pipeline.
//!
//! This module defines the types that flow through a run:
//!
//! - `ItemKey` / `Fingerprint`: stable natural identity of a document
//! - `Stage` / `ItemStatus`: per-item progress through the pipeline
//! - `Task` / `TaskStatus` / `TaskOutcome`: one stage's unit of work
//! - document payloads (`RawContent`, `StructuredDocument`, `Labels`)

pub mod document;
pub mod item;
pub mod task;

pub use document::{Labels, RawContent, StageInput, StagePayload, StructuredDocument};
pub use item::{Fingerprint, ItemKey, ItemStatus, Stage};
pub use task::{Task, TaskOutcome, TaskStatus};
