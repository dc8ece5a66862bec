//! CLI command definitions for paperforge.
//!
//! Two commands: `run` processes a batch of items through the pipeline,
//! `index` inspects the deduplication index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::connectors::{CollaboratorSet, FilesystemSource, JsonStorage, PlainTextParser, RuleTagger};
use crate::dedup::{DedupIndex, InMemoryIndex, JsonIndex};
use crate::model::ItemKey;
use crate::pipeline::{PipelineConfig, PipelineOrchestrator};

/// Default directory holding raw source files.
const DEFAULT_DATA_DIR: &str = "./data";

/// Default directory for persisted documents.
const DEFAULT_OUTPUT_DIR: &str = "./store";

/// Research document ingestion pipeline.
#[derive(Parser)]
#[command(name = "paperforge")]
#[command(about = "Ingest research documents through an acquire/parse/classify/persist pipeline")]
#[command(version)]
#[command(
    long_about = "paperforge runs batches of research documents through a four-stage \
pipeline: acquire raw content, parse it into a structured document, classify it with \
category labels, and persist the result.\n\nItems already recorded in the deduplication \
index are skipped; failed items are retried on the next run.\n\nExample usage:\n  \
paperforge run --ids arxiv:2401.01234:v1,arxiv:2401.05678:v1 --data-dir ./data --out ./store"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run a batch of items through the pipeline.
    Run(RunArgs),

    /// Inspect the deduplication index.
    Index(IndexArgs),
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Comma-separated item ids in source:local_id:vN form.
    #[arg(long)]
    pub ids: Option<String>,

    /// File with one item id per line (# starts a comment).
    #[arg(long)]
    pub ids_file: Option<PathBuf>,

    /// Directory holding raw source files.
    #[arg(short = 'd', long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Output directory for persisted documents.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub out: PathBuf,

    /// Deduplication index file. Omitting it keeps the index in memory
    /// for this run only.
    #[arg(long, env = "PAPERFORGE_DEDUP_INDEX")]
    pub index: Option<PathBuf>,

    /// Where to write the run report JSON.
    #[arg(long, env = "PAPERFORGE_REPORT_PATH")]
    pub report: Option<PathBuf>,

    /// Maximum number of tasks running concurrently.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Minimum abstract length in characters for the quality gate.
    #[arg(long)]
    pub min_abstract_chars: Option<usize>,

    /// Comma-separated regex patterns for categories to exclude.
    #[arg(long)]
    pub exclude_categories: Option<String>,

    /// Show what would run (and what the index would skip) without
    /// executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the index command.
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Deduplication index file to inspect.
    #[arg(long, env = "PAPERFORGE_DEDUP_INDEX")]
    pub index: PathBuf,

    /// Output entries as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before
/// running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Index(args) => run_index_command(args).await,
    }
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let keys = collect_item_keys(args.ids.as_deref(), args.ids_file.as_deref())?;
    if keys.is_empty() {
        anyhow::bail!("no items to process; provide --ids or --ids-file");
    }

    // Environment first, flags override.
    let mut config = PipelineConfig::from_env()?;
    if let Some(n) = args.max_concurrent {
        config = config.with_max_concurrent_tasks(n);
    }
    if let Some(chars) = args.min_abstract_chars {
        config = config.with_min_abstract_chars(chars);
    }
    if let Some(raw) = &args.exclude_categories {
        config = config.with_excluded_categories(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    if let Some(path) = &args.index {
        config = config.with_dedup_index_path(path);
    }
    if let Some(path) = &args.report {
        config = config.with_report_path(path);
    }

    let index: Arc<dyn DedupIndex> = match &config.dedup_index_path {
        Some(path) => Arc::new(JsonIndex::open(path)?),
        None => {
            warn!("no dedup index path set; duplicates are only tracked within this run");
            Arc::new(InMemoryIndex::new())
        }
    };

    if args.dry_run {
        for key in &keys {
            if index.seen(&key.fingerprint())? {
                println!("skip (already committed): {key}");
            } else {
                println!("would process: {key}");
            }
        }
        return Ok(());
    }

    let collaborators = CollaboratorSet::new(
        Arc::new(FilesystemSource::new(&args.data_dir)),
        Arc::new(PlainTextParser::new()),
        Arc::new(RuleTagger::with_default_rules()),
        Arc::new(JsonStorage::new(&args.out)),
    );

    let orchestrator = PipelineOrchestrator::new(config, collaborators, index)?;

    // Ctrl-C stops dispatching new tasks and finalizes a partial report.
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(keys).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        for item in report.failed_items() {
            println!(
                "  failed: {} ({})",
                item.key,
                item.reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    // Failed items are a warning-level outcome, not a process failure;
    // the next run retries them.
    Ok(())
}

async fn run_index_command(args: IndexArgs) -> anyhow::Result<()> {
    let index = JsonIndex::open(&args.index)?;
    let mut entries = index.entries()?;
    entries.sort_by(|a, b| a.1.committed_at.cmp(&b.1.committed_at));

    if args.json {
        let output: Vec<_> = entries
            .iter()
            .map(|(fp, entry)| {
                serde_json::json!({
                    "fingerprint": fp.as_str(),
                    "item": entry.item_key.to_string(),
                    "committed_at": entry.committed_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} entries in {}", entries.len(), args.index.display());
        for (fp, entry) in &entries {
            println!("  {} committed {}", fp, entry.committed_at.to_rfc3339());
        }
    }
    Ok(())
}

/// Merges the --ids list and the --ids-file contents into item keys,
/// preserving order.
fn collect_item_keys(ids: Option<&str>, ids_file: Option<&Path>) -> anyhow::Result<Vec<ItemKey>> {
    let mut keys = Vec::new();

    if let Some(raw) = ids {
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            keys.push(parse_key(part)?);
        }
    }

    if let Some(path) = ids_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            keys.push(parse_key(line)?);
        }
    }

    Ok(keys)
}

fn parse_key(s: &str) -> anyhow::Result<ItemKey> {
    ItemKey::parse(s)
        .ok_or_else(|| anyhow::anyhow!("invalid item id '{s}', expected source:local_id:vN"))
}
