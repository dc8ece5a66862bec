//! paperforge: Research document ingestion pipeline.
//!
//! This library provides a dependency-graph driven pipeline that acquires
//! raw research documents, parses them into structured form, classifies
//! them with category labels, and persists the result, with retrying
//! execution, quality gates, and cross-run deduplication.

// Core modules
pub mod cli;
pub mod connectors;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod graph;
pub mod model;
pub mod pipeline;
pub mod quality;

// Re-export commonly used error types
pub use error::{CollaboratorError, GraphError};
