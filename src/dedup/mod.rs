//! Deduplication index: persistent set of processed-item fingerprints.
//!
//! The index is consulted before an item's Acquire task is admitted and
//! committed only after its Persist task succeeds, so an item that fails
//! mid-chain is legitimately retried by a future run. Commits are atomic
//! read-modify-write with last-committed-wins semantics.

pub mod json_index;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Fingerprint, ItemKey};

pub use json_index::JsonIndex;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index file could not be read or written.
    #[error("index IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index file is not valid JSON.
    #[error("index file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The in-process lock was poisoned by a panicking holder.
    #[error("index lock poisoned")]
    Poisoned,
}

/// One committed entry: fingerprint -> item key + completion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Natural key of the item the fingerprint resolves to.
    pub item_key: ItemKey,
    /// Timestamp of the last successful completion.
    pub committed_at: DateTime<Utc>,
}

/// Persistent set of content fingerprints.
///
/// Implementations must be safe for concurrent `seen`/`commit` calls
/// across items processed in the same run.
pub trait DedupIndex: Send + Sync {
    /// Returns true if the fingerprint has already been fully processed.
    fn seen(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError>;

    /// Records a successful completion. Upserts: a later commit for the
    /// same fingerprint replaces the earlier entry.
    fn commit(&self, fingerprint: &Fingerprint, key: &ItemKey) -> Result<(), IndexError>;

    /// Snapshot of all entries, for inspection and reporting.
    fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>, IndexError>;
}

/// In-memory index for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: RwLock<HashMap<Fingerprint, IndexEntry>>,
}

impl InMemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupIndex for InMemoryIndex {
    fn seen(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError> {
        let entries = self.entries.read().map_err(|_| IndexError::Poisoned)?;
        Ok(entries.contains_key(fingerprint))
    }

    fn commit(&self, fingerprint: &Fingerprint, key: &ItemKey) -> Result<(), IndexError> {
        let mut entries = self.entries.write().map_err(|_| IndexError::Poisoned)?;
        entries.insert(
            fingerprint.clone(),
            IndexEntry {
                item_key: key.clone(),
                committed_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>, IndexError> {
        let entries = self.entries.read().map_err(|_| IndexError::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(fp, entry)| (fp.clone(), entry.clone()))
            .collect())
    }
}
