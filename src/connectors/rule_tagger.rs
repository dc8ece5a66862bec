//! Rule-based tagger.
//!
//! Classifies documents by matching keyword patterns against the title
//! and abstract. Purely local, so it never fails transiently; an empty
//! rule table is the only misuse and is caught at construction.

use async_trait::async_trait;
use regex::RegexBuilder;

use crate::error::CollaboratorError;
use crate::model::{Labels, StructuredDocument};

use super::Tagger;

/// One classification rule: a category plus the keywords that select it.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    /// Category assigned when any keyword matches.
    pub category: String,
    /// Keywords matched case-insensitively on word boundaries.
    pub keywords: Vec<String>,
}

impl CategoryRule {
    /// Creates a rule.
    pub fn new(category: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            category: category.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Keyword-matching tagger over title and abstract text.
#[derive(Debug)]
pub struct RuleTagger {
    rules: Vec<(String, regex::Regex)>,
}

impl RuleTagger {
    /// Builds a tagger from a rule table.
    ///
    /// # Errors
    ///
    /// Returns a permanent `CollaboratorError` if the table is empty or a
    /// keyword does not compile into a pattern.
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, CollaboratorError> {
        if rules.is_empty() {
            return Err(CollaboratorError::permanent("rule table is empty"));
        }

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let alternation = rule
                .keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"\b(?:{alternation})\b");
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    CollaboratorError::permanent(format!(
                        "invalid keyword pattern for '{}': {e}",
                        rule.category
                    ))
                })?;
            compiled.push((rule.category, regex));
        }
        Ok(Self { rules: compiled })
    }

    /// Default rule table for quantitative research corpora.
    pub fn with_default_rules() -> Self {
        let rules = vec![
            CategoryRule::new(
                "machine-learning",
                &[
                    "machine learning",
                    "neural network",
                    "deep learning",
                    "gradient boosting",
                    "random forest",
                ],
            ),
            CategoryRule::new(
                "reinforcement-learning",
                &[
                    "reinforcement learning",
                    "q-learning",
                    "policy gradient",
                    "actor-critic",
                    "trading agent",
                ],
            ),
            CategoryRule::new(
                "time-series",
                &["time series", "forecasting", "arima", "garch", "volatility"],
            ),
            CategoryRule::new(
                "risk-management",
                &["risk management", "value at risk", "stress testing", "credit risk"],
            ),
        ];
        // The built-in table compiles; only user-supplied keywords can fail.
        Self::new(rules).expect("default rule table must compile")
    }
}

#[async_trait]
impl Tagger for RuleTagger {
    async fn classify(&self, document: &StructuredDocument) -> Result<Labels, CollaboratorError> {
        let text = format!("{}\n{}", document.title, document.abstract_text);

        let categories: Vec<String> = self
            .rules
            .iter()
            .filter(|(_, regex)| regex.is_match(&text))
            .map(|(category, _)| category.clone())
            .collect();

        // Source-declared categories ride along as tags.
        let tags = document.categories.clone();
        let confidence = if categories.is_empty() { 0.0 } else { 1.0 };

        Ok(Labels {
            categories,
            tags,
            confidence,
        })
    }
}
