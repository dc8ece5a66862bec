//! Filesystem source connector.
//!
//! Reads raw item payloads from a flat directory of JSON files, named
//! `<source>-<local_id>-v<version>.json`. Useful for local corpora and as
//! the reference `SourceConnector` for the CLI.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CollaboratorError;
use crate::model::{ItemKey, RawContent};

use super::SourceConnector;

/// Source connector backed by a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    /// Creates a source reading from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the raw file backing `key`.
    fn path_for(&self, key: &ItemKey) -> PathBuf {
        self.root
            .join(format!("{}-{}-v{}.json", key.source, key.local_id, key.version))
    }
}

#[async_trait]
impl SourceConnector for FilesystemSource {
    async fn fetch(&self, key: &ItemKey) -> Result<RawContent, CollaboratorError> {
        let path = self.path_for(key);
        debug!(item = %key, path = %path.display(), "fetching raw content");

        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(RawContent::new(key.clone(), data, "application/json")),
            // A missing file will not appear on retry; everything else
            // (permissions flaking over NFS, interrupted reads) may.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                CollaboratorError::permanent(format!("item file not found: {}", path.display())),
            ),
            Err(e) => Err(CollaboratorError::transient(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = ItemKey::new("arxiv", "2401.00001", 1);
        std::fs::write(
            dir.path().join("arxiv-2401.00001-v1.json"),
            r#"{"title":"T"}"#,
        )
        .unwrap();

        let source = FilesystemSource::new(dir.path());
        let raw = source.fetch(&key).await.unwrap();
        assert_eq!(raw.key, key);
        assert_eq!(raw.data, r#"{"title":"T"}"#);
        assert_eq!(raw.content_type, "application/json");
    }

    #[tokio::test]
    async fn missing_file_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let source = FilesystemSource::new(dir.path());
        let err = source
            .fetch(&ItemKey::new("arxiv", "nope", 1))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
