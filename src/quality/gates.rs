//! Built-in quality gates.
//!
//! These cover the inclusion criteria the pipeline ships with: a minimum
//! abstract length and a non-empty title on parsed documents, and a
//! category exclusion list on classification output.

use regex::RegexSet;

use crate::model::{Stage, StagePayload};

use super::{GateResult, QualityGate};

/// Default minimum abstract length in characters.
pub const DEFAULT_MIN_ABSTRACT_CHARS: usize = 50;

/// Rejects parsed documents whose abstract is shorter than a threshold.
#[derive(Debug, Clone)]
pub struct MinAbstractLength {
    min_chars: usize,
}

impl MinAbstractLength {
    /// Creates the gate with the given threshold.
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

impl Default for MinAbstractLength {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ABSTRACT_CHARS)
    }
}

impl QualityGate for MinAbstractLength {
    fn name(&self) -> &str {
        "min_abstract_length"
    }

    fn stage(&self) -> Stage {
        Stage::Parse
    }

    fn check(&self, payload: &StagePayload) -> GateResult {
        let Some(document) = payload.as_document() else {
            return GateResult::pass();
        };
        let len = document.abstract_text.trim().chars().count();
        if len < self.min_chars {
            return GateResult::reject(format!(
                "min_abstract_length: abstract has {len} characters, minimum is {}",
                self.min_chars
            ));
        }
        GateResult::pass()
    }
}

/// Rejects parsed documents without a usable title.
#[derive(Debug, Clone, Default)]
pub struct RequireTitle;

impl QualityGate for RequireTitle {
    fn name(&self) -> &str {
        "require_title"
    }

    fn stage(&self) -> Stage {
        Stage::Parse
    }

    fn check(&self, payload: &StagePayload) -> GateResult {
        let Some(document) = payload.as_document() else {
            return GateResult::pass();
        };
        if document.title.trim().is_empty() {
            return GateResult::reject("require_title: document has no title");
        }
        GateResult::pass()
    }
}

/// Rejects classification output matching any excluded category pattern.
#[derive(Debug)]
pub struct ExcludedCategories {
    patterns: RegexSet,
}

impl ExcludedCategories {
    /// Builds the gate from regex patterns matched against each assigned
    /// category.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a pattern does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }
}

impl QualityGate for ExcludedCategories {
    fn name(&self) -> &str {
        "excluded_categories"
    }

    fn stage(&self) -> Stage {
        Stage::Classify
    }

    fn check(&self, payload: &StagePayload) -> GateResult {
        let Some(labels) = payload.as_labels() else {
            return GateResult::pass();
        };
        for category in &labels.categories {
            if self.patterns.is_match(category) {
                return GateResult::reject(format!(
                    "excluded_categories: category '{category}' is excluded"
                ));
            }
        }
        GateResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemKey, Labels, StructuredDocument};

    fn doc_payload(abstract_text: &str) -> StagePayload {
        StagePayload::Document(StructuredDocument::new(
            ItemKey::new("arxiv", "1", 1),
            "Title",
            abstract_text,
        ))
    }

    #[test]
    fn short_abstract_rejected_with_threshold_in_reason() {
        let gate = MinAbstractLength::new(50);
        let result = gate.check(&doc_payload("ten chars."));
        assert!(!result.passed);

        let reason = result.reason.unwrap();
        assert!(reason.contains("min_abstract_length"));
        assert!(reason.contains("10"));
        assert!(reason.contains("50"));
    }

    #[test]
    fn long_abstract_passes() {
        let gate = MinAbstractLength::new(50);
        let text = "A sufficiently detailed abstract describing the contribution at length.";
        assert!(gate.check(&doc_payload(text)).passed);
    }

    #[test]
    fn whitespace_does_not_count_toward_length() {
        let gate = MinAbstractLength::new(5);
        let result = gate.check(&doc_payload("   ab   "));
        assert!(!result.passed);
    }

    #[test]
    fn missing_title_rejected() {
        let gate = RequireTitle;
        let payload = StagePayload::Document(StructuredDocument::new(
            ItemKey::new("arxiv", "1", 1),
            "  ",
            "Abstract",
        ));
        assert!(!gate.check(&payload).passed);
        assert!(gate.check(&doc_payload("abstract")).passed);
    }

    #[test]
    fn excluded_category_rejected() {
        let gate = ExcludedCategories::new(["^spam$", "^off-topic"]).unwrap();

        let rejected = StagePayload::Labels(Labels::new(vec!["spam".to_string()]));
        let result = gate.check(&rejected);
        assert!(!result.passed);
        assert!(result.reason.unwrap().contains("spam"));

        let accepted = StagePayload::Labels(Labels::new(vec!["time-series".to_string()]));
        assert!(gate.check(&accepted).passed);
    }

    #[test]
    fn gates_ignore_foreign_payloads() {
        // A labels payload passing through a parse-stage gate is not its
        // concern.
        let gate = MinAbstractLength::default();
        let labels = StagePayload::Labels(Labels::new(Vec::new()));
        assert!(gate.check(&labels).passed);
    }
}
