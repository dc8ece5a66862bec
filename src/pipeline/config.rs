//! Pipeline configuration for the orchestrator.
//!
//! Covers execution limits, retry policy, quality gate thresholds and
//! persistence paths. Values come from `Default`, builder setters, or
//! `PAPERFORGE_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::executor::RetryPolicy;
use crate::quality::{ExcludedCategories, GateChain, MinAbstractLength, RequireTitle};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),

    /// An excluded-category pattern does not compile.
    #[error("invalid excluded-category pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Execution settings
    /// Maximum number of tasks running concurrently (worker pool size).
    pub max_concurrent_tasks: usize,
    /// Timeout for one collaborator call.
    pub task_timeout: Duration,

    // Retry settings
    /// Attempts per task, including the first.
    pub retry_max_attempts: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Cap on a single backoff delay.
    pub retry_max_delay: Duration,
    /// Jitter factor in [0.0, 1.0).
    pub retry_jitter: f64,

    // Quality gate settings
    /// Minimum abstract length in characters.
    pub min_abstract_chars: usize,
    /// Regex patterns for categories to exclude.
    pub excluded_categories: Vec<String>,

    // Persistence settings
    /// Path of the deduplication index file; `None` keeps it in memory.
    pub dedup_index_path: Option<PathBuf>,
    /// Where to write the run report for audit; `None` skips the write.
    pub report_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            task_timeout: Duration::from_secs(60),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            retry_jitter: 0.2,
            min_abstract_chars: 50,
            excluded_categories: Vec::new(),
            dedup_index_path: None,
            report_path: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PAPERFORGE_MAX_CONCURRENT_TASKS`: worker pool size (default: 4)
    /// - `PAPERFORGE_TASK_TIMEOUT_SECS`: per-call timeout (default: 60)
    /// - `PAPERFORGE_RETRY_MAX_ATTEMPTS`: attempts per task (default: 3)
    /// - `PAPERFORGE_RETRY_BASE_DELAY_MS`: first retry delay (default: 500)
    /// - `PAPERFORGE_RETRY_MAX_DELAY_SECS`: backoff cap (default: 30)
    /// - `PAPERFORGE_RETRY_JITTER`: jitter factor (default: 0.2)
    /// - `PAPERFORGE_MIN_ABSTRACT_CHARS`: gate threshold (default: 50)
    /// - `PAPERFORGE_EXCLUDED_CATEGORIES`: comma-separated regex patterns
    /// - `PAPERFORGE_DEDUP_INDEX`: dedup index file path
    /// - `PAPERFORGE_REPORT_PATH`: run report output path
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_env("PAPERFORGE_MAX_CONCURRENT_TASKS")? {
            config.max_concurrent_tasks = v;
        }
        if let Some(v) = parse_env("PAPERFORGE_TASK_TIMEOUT_SECS")? {
            config.task_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_env("PAPERFORGE_RETRY_MAX_ATTEMPTS")? {
            config.retry_max_attempts = v;
        }
        if let Some(v) = parse_env("PAPERFORGE_RETRY_BASE_DELAY_MS")? {
            config.retry_base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_env("PAPERFORGE_RETRY_MAX_DELAY_SECS")? {
            config.retry_max_delay = Duration::from_secs(v);
        }
        if let Some(v) = parse_env("PAPERFORGE_RETRY_JITTER")? {
            config.retry_jitter = v;
        }
        if let Some(v) = parse_env("PAPERFORGE_MIN_ABSTRACT_CHARS")? {
            config.min_abstract_chars = v;
        }
        if let Ok(v) = std::env::var("PAPERFORGE_EXCLUDED_CATEGORIES") {
            config.excluded_categories = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = std::env::var("PAPERFORGE_DEDUP_INDEX") {
            config.dedup_index_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PAPERFORGE_REPORT_PATH") {
            config.report_path = Some(PathBuf::from(v));
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the worker pool size.
    pub fn with_max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = n;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Sets the retry attempt budget.
    pub fn with_retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    /// Sets the minimum abstract length gate threshold.
    pub fn with_min_abstract_chars(mut self, chars: usize) -> Self {
        self.min_abstract_chars = chars;
        self
    }

    /// Sets the excluded-category patterns.
    pub fn with_excluded_categories(mut self, patterns: Vec<String>) -> Self {
        self.excluded_categories = patterns;
        self
    }

    /// Sets the dedup index path.
    pub fn with_dedup_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dedup_index_path = Some(path.into());
        self
    }

    /// Sets the run report output path.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Validates field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(ConfigError::ValidationFailed(format!(
                "retry_jitter must be in [0.0, 1.0), got {}",
                self.retry_jitter
            )));
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "task_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy derived from the retry settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts)
            .with_base_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
            .with_jitter(self.retry_jitter)
    }

    /// Builds the quality gate chain from the gate settings.
    pub fn gate_chain(&self) -> Result<GateChain, ConfigError> {
        let mut chain = GateChain::new()
            .with_gate(Box::new(RequireTitle))
            .with_gate(Box::new(MinAbstractLength::new(self.min_abstract_chars)));

        if !self.excluded_categories.is_empty() {
            chain = chain.with_gate(Box::new(ExcludedCategories::new(
                &self.excluded_categories,
            )?));
        }
        Ok(chain)
    }
}

/// Reads and parses one environment variable, distinguishing "absent"
/// from "present but malformed".
fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
