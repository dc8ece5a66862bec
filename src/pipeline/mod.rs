//! Pipeline orchestration: configuration, run coordination and reporting.

pub mod config;
pub mod orchestrator;
pub mod report;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{CancelHandle, PipelineError, PipelineOrchestrator};
pub use report::{ItemOutcome, RunReport, StatusCounts};
