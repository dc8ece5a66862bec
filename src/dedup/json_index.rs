//! File-backed deduplication index.
//!
//! Entries live in one JSON file loaded at open and rewritten on every
//! commit. Commit volume is bounded by the number of items per run, so a
//! full rewrite is cheaper than it looks and keeps the file readable for
//! operators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;

use crate::model::{Fingerprint, ItemKey};

use super::{DedupIndex, IndexEntry, IndexError};

/// Deduplication index persisted as a JSON file.
#[derive(Debug)]
pub struct JsonIndex {
    path: PathBuf,
    entries: Mutex<HashMap<Fingerprint, IndexEntry>>,
}

impl JsonIndex {
    /// Opens the index at `path`, creating an empty one if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(IndexError::Io(e)),
        };

        debug!(path = %path.display(), entries = entries.len(), "opened dedup index");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current entries back to disk. Called with the entry
    /// lock held so commits serialize.
    fn flush(&self, entries: &HashMap<Fingerprint, IndexEntry>) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DedupIndex for JsonIndex {
    fn seen(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError> {
        let entries = self.entries.lock().map_err(|_| IndexError::Poisoned)?;
        Ok(entries.contains_key(fingerprint))
    }

    fn commit(&self, fingerprint: &Fingerprint, key: &ItemKey) -> Result<(), IndexError> {
        let mut entries = self.entries.lock().map_err(|_| IndexError::Poisoned)?;
        entries.insert(
            fingerprint.clone(),
            IndexEntry {
                item_key: key.clone(),
                committed_at: Utc::now(),
            },
        );
        self.flush(&entries)
    }

    fn entries(&self) -> Result<Vec<(Fingerprint, IndexEntry)>, IndexError> {
        let entries = self.entries.lock().map_err(|_| IndexError::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(fp, entry)| (fp.clone(), entry.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let key = ItemKey::new("arxiv", "2401.00001", 1);
        let fp = key.fingerprint();

        {
            let index = JsonIndex::open(&path).unwrap();
            assert!(!index.seen(&fp).unwrap());
            index.commit(&fp, &key).unwrap();
        }

        let index = JsonIndex::open(&path).unwrap();
        assert!(index.seen(&fp).unwrap());
        let entries = index.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.item_key, key);
    }

    #[test]
    fn opening_missing_file_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = JsonIndex::open(dir.path().join("missing.json")).unwrap();
        assert!(index.entries().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(matches!(JsonIndex::open(&path), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn creates_parent_directories_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/index.json");
        let key = ItemKey::new("arxiv", "1", 1);

        let index = JsonIndex::open(&path).unwrap();
        index.commit(&key.fingerprint(), &key).unwrap();
        assert!(path.exists());
    }
}
