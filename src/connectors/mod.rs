//! Collaborator contracts and reference implementations.
//!
//! The pipeline core talks to four external collaborators, one per stage.
//! Each is a trait object selected by configuration at run start, and each
//! surfaces the transient/permanent distinction explicitly through
//! `CollaboratorError` so the task executor can apply retry policy.
//!
//! Reference implementations ship alongside the traits:
//! - `FilesystemSource`: reads raw item JSON from a directory
//! - `PlainTextParser`: turns raw JSON payloads into structured documents
//! - `RuleTagger`: keyword/regex classification over title and abstract
//! - `JsonStorage`: one JSON file per persisted document plus an index

pub mod filesystem;
pub mod json_storage;
pub mod rule_tagger;
pub mod text_parser;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::model::{ItemKey, Labels, RawContent, StructuredDocument};

pub use filesystem::FilesystemSource;
pub use json_storage::JsonStorage;
pub use rule_tagger::RuleTagger;
pub use text_parser::PlainTextParser;

/// Fetches raw content for an item from its source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Fetches the raw content behind `key`.
    async fn fetch(&self, key: &ItemKey) -> Result<RawContent, CollaboratorError>;
}

/// Extracts a structured document from raw content.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parses `raw` into a structured document. Malformed input is a
    /// permanent failure, never retried.
    async fn parse(&self, raw: &RawContent) -> Result<StructuredDocument, CollaboratorError>;
}

/// Attaches category labels and tags to a document.
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Classifies `document` into labels.
    async fn classify(&self, document: &StructuredDocument) -> Result<Labels, CollaboratorError>;
}

/// Persists a fully processed document.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Writes the document and its labels. This is the sole durability
    /// boundary of the pipeline.
    async fn persist(
        &self,
        key: &ItemKey,
        document: &StructuredDocument,
        labels: &Labels,
    ) -> Result<(), CollaboratorError>;
}

/// One implementation of each collaborator, bundled for a run.
#[derive(Clone)]
pub struct CollaboratorSet {
    /// Source connector bound to Acquire tasks.
    pub source: Arc<dyn SourceConnector>,
    /// Parser bound to Parse tasks.
    pub parser: Arc<dyn DocumentParser>,
    /// Tagger bound to Classify tasks.
    pub tagger: Arc<dyn Tagger>,
    /// Storage backend bound to Persist tasks.
    pub storage: Arc<dyn StorageBackend>,
}

impl CollaboratorSet {
    /// Bundles the four collaborators.
    pub fn new(
        source: Arc<dyn SourceConnector>,
        parser: Arc<dyn DocumentParser>,
        tagger: Arc<dyn Tagger>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            source,
            parser,
            tagger,
            storage,
        }
    }
}
