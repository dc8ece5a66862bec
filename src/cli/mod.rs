//! Command-line interface for paperforge.
//!
//! Provides commands for running ingestion batches and inspecting the
//! deduplication index.

mod commands;

pub use commands::{parse_cli, run_with_cli};
