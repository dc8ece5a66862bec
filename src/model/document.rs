//! Document payloads exchanged between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::ItemKey;

/// Raw content fetched from a source connector, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContent {
    /// Key of the item this content belongs to.
    pub key: ItemKey,
    /// Raw payload as delivered by the source.
    pub data: String,
    /// MIME-ish hint for the parser (e.g. "application/json").
    pub content_type: String,
    /// When the content was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl RawContent {
    /// Creates raw content fetched now.
    pub fn new(key: ItemKey, data: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            key,
            data: data.into(),
            content_type: content_type.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Structured knowledge unit extracted from raw content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Key of the item this document belongs to.
    pub key: ItemKey,
    /// Document title.
    pub title: String,
    /// Abstract text.
    pub abstract_text: String,
    /// Full body text, when the source provides it.
    #[serde(default)]
    pub body: Option<String>,
    /// Author names.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Source-declared categories (e.g. arXiv primary categories).
    #[serde(default)]
    pub categories: Vec<String>,
    /// Publication date, when known.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

impl StructuredDocument {
    /// Creates a document with the mandatory fields only.
    pub fn new(key: ItemKey, title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            abstract_text: abstract_text.into(),
            body: None,
            authors: Vec::new(),
            categories: Vec::new(),
            published: None,
        }
    }

    /// Returns true when full body text is available.
    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.trim().is_empty())
    }
}

/// Classification output attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Assigned categories.
    pub categories: Vec<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f64,
}

impl Labels {
    /// Creates labels with the given categories and full confidence.
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            tags: Vec::new(),
            confidence: 1.0,
        }
    }
}

/// Output payload produced by one stage, consumed by the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    /// Output of Acquire.
    Raw(RawContent),
    /// Output of Parse.
    Document(StructuredDocument),
    /// Output of Classify.
    Labels(Labels),
    /// Output of Persist (no data, the side effect is the result).
    Persisted,
}

impl StagePayload {
    /// Returns the document if this payload carries one.
    pub fn as_document(&self) -> Option<&StructuredDocument> {
        match self {
            StagePayload::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Returns the labels if this payload carries them.
    pub fn as_labels(&self) -> Option<&Labels> {
        match self {
            StagePayload::Labels(labels) => Some(labels),
            _ => None,
        }
    }
}

/// Input handed to the executor for one task, assembled by the
/// orchestrator from the item's previously completed stages.
#[derive(Debug, Clone)]
pub enum StageInput {
    /// Acquire needs only the item key.
    Acquire(ItemKey),
    /// Parse consumes the acquired raw content.
    Parse(RawContent),
    /// Classify consumes the parsed document.
    Classify(StructuredDocument),
    /// Persist consumes everything the chain produced.
    Persist {
        key: ItemKey,
        document: StructuredDocument,
        labels: Labels,
    },
}
