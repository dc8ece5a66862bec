//! Item identity and lifecycle types.

use serde::{Deserialize, Serialize};

/// Stable natural key identifying one document across runs.
///
/// The key is structured (source + source-local id + version) rather than
/// hashed, so two distinct source items can never collide on the same
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Name of the source the item comes from (e.g. "arxiv").
    pub source: String,
    /// Identifier local to that source (e.g. "2401.01234").
    pub local_id: String,
    /// Version of the item at the source.
    pub version: u32,
}

impl ItemKey {
    /// Creates a new item key.
    pub fn new(source: impl Into<String>, local_id: impl Into<String>, version: u32) -> Self {
        Self {
            source: source.into(),
            local_id: local_id.into(),
            version,
        }
    }

    /// Derives the deduplication fingerprint for this key.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!("{}:{}:v{}", self.source, self.local_id, self.version))
    }

    /// Parses a key from its `source:local_id:vN` rendering.
    ///
    /// Returns `None` when the string does not have all three parts.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let source = parts.next()?;
        let local_id = parts.next()?;
        let version = parts.next()?.strip_prefix('v')?.parse().ok()?;
        if source.is_empty() || local_id.is_empty() {
            return None;
        }
        Some(Self::new(source, local_id, version))
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:v{}", self.source, self.local_id, self.version)
    }
}

/// Content fingerprint used by the deduplication index.
///
/// Rendered from the exact structured natural key; not a cryptographic
/// hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub(crate) String);

impl Fingerprint {
    /// Returns the string form of the fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One processing stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch raw content from the source connector.
    Acquire,
    /// Extract a structured document from the raw content.
    Parse,
    /// Attach category labels and tags.
    Classify,
    /// Write the document and labels to storage.
    Persist,
}

impl Stage {
    /// Fixed execution order of the stages within one item's chain.
    pub const ORDER: [Stage; 4] = [Stage::Acquire, Stage::Parse, Stage::Classify, Stage::Persist];

    /// Returns the stage that follows this one, or `None` after Persist.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Acquire => Some(Stage::Parse),
            Stage::Parse => Some(Stage::Classify),
            Stage::Classify => Some(Stage::Persist),
            Stage::Persist => None,
        }
    }

    /// Stable lowercase name, used in task ids and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Parse => "parse",
            Stage::Classify => "classify",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one item over the course of a run.
///
/// `Completed`, `Rejected`, `Failed` and `SkippedDuplicate` are terminal;
/// `Pending` is also a legal final state for items a cancelled run never
/// dispatched, so a future run can resume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not yet dispatched.
    Pending,
    /// At least one of the item's tasks has run.
    InProgress,
    /// All stages succeeded and the item was persisted.
    Completed,
    /// A quality gate excluded the item. Expected, not an error.
    Rejected,
    /// A task exhausted its retries or failed permanently.
    Failed,
    /// The dedup index already contained the item's fingerprint.
    SkippedDuplicate,
}

impl ItemStatus {
    /// Returns true once no further tasks will run for the item.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending | ItemStatus::InProgress)
    }

    /// Stable lowercase name for reports and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Failed => "failed",
            ItemStatus::SkippedDuplicate => "skipped_duplicate",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
