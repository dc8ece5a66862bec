//! JSON file storage backend.
//!
//! Persists each document as one JSON file under a data directory. The
//! stored record bundles the document with its labels and a stored-at
//! timestamp, so downstream consumers get a self-contained knowledge
//! unit per file.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CollaboratorError;
use crate::model::{ItemKey, Labels, StructuredDocument};

use super::StorageBackend;

/// On-disk record for one persisted item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The persisted document.
    pub document: StructuredDocument,
    /// Labels attached by the classify stage.
    pub labels: Labels,
    /// When the record was written.
    pub stored_at: DateTime<Utc>,
}

/// Storage backend writing one JSON file per item.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Creates a backend rooted at `root`. The directory is created on
    /// first persist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &ItemKey) -> PathBuf {
        self.root
            .join(format!("{}-{}-v{}.json", key.source, key.local_id, key.version))
    }

    /// Reads a previously stored record, if present.
    pub async fn load(&self, key: &ItemKey) -> Result<Option<StoredRecord>, CollaboratorError> {
        match tokio::fs::read_to_string(self.record_path(key)).await {
            Ok(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|e| CollaboratorError::permanent(format!("corrupt record: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CollaboratorError::transient(e)),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonStorage {
    async fn persist(
        &self,
        key: &ItemKey,
        document: &StructuredDocument,
        labels: &Labels,
    ) -> Result<(), CollaboratorError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(CollaboratorError::transient)?;

        let record = StoredRecord {
            document: document.clone(),
            labels: labels.clone(),
            stored_at: Utc::now(),
        };
        let data = serde_json::to_string_pretty(&record)
            .map_err(|e| CollaboratorError::permanent(format!("unserializable record: {e}")))?;

        let path = self.record_path(key);
        // Write to a sibling temp file first so a crash cannot leave a
        // half-written record behind.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(CollaboratorError::transient)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(CollaboratorError::transient)?;

        debug!(item = %key, path = %path.display(), "persisted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ItemKey {
        ItemKey::new("arxiv", "2401.00001", 1)
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        let doc = StructuredDocument::new(key(), "Title", "Abstract");
        let labels = Labels::new(vec!["time-series".to_string()]);
        storage.persist(&key(), &doc, &labels).await.unwrap();

        let record = storage.load(&key()).await.unwrap().unwrap();
        assert_eq!(record.document, doc);
        assert_eq!(record.labels, labels);
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());
        assert!(storage.load(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persist_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        let doc = StructuredDocument::new(key(), "Old", "Abstract");
        storage
            .persist(&key(), &doc, &Labels::new(Vec::new()))
            .await
            .unwrap();

        let doc = StructuredDocument::new(key(), "New", "Abstract");
        storage
            .persist(&key(), &doc, &Labels::new(Vec::new()))
            .await
            .unwrap();

        let record = storage.load(&key()).await.unwrap().unwrap();
        assert_eq!(record.document.title, "New");
    }
}
