//! Reference document parser for raw JSON payloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::CollaboratorError;
use crate::model::{RawContent, StructuredDocument};

use super::DocumentParser;

/// Wire shape of a raw item payload as delivered by sources.
#[derive(Debug, Deserialize)]
struct RawDocument {
    title: String,
    #[serde(alias = "summary")]
    abstract_text: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    published: Option<DateTime<Utc>>,
}

/// Parser for plain JSON document payloads.
///
/// Malformed payloads are permanent failures: the same bytes will not
/// parse any better on a retry.
#[derive(Debug, Clone, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    /// Creates the parser.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, raw: &RawContent) -> Result<StructuredDocument, CollaboratorError> {
        let wire: RawDocument = serde_json::from_str(&raw.data)
            .map_err(|e| CollaboratorError::permanent(format!("malformed document: {e}")))?;

        if wire.title.trim().is_empty() {
            return Err(CollaboratorError::permanent("document has an empty title"));
        }

        Ok(StructuredDocument {
            key: raw.key.clone(),
            title: wire.title,
            abstract_text: wire.abstract_text,
            body: wire.body,
            authors: wire.authors,
            categories: wire.categories,
            published: wire.published,
        })
    }
}
