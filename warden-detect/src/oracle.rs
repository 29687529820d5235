//! The Extractor oracle boundary.
//!
//! Modeled as a synchronous trait rather than `async_trait` so the single
//! suspension point in the pipeline (see the concurrency design note) is
//! explicit at the call site instead of implied by the function signature;
//! a caller already running an async executor supplies a blocking adapter.

use std::time::Duration;

use warden_core::{Catalog, DetectError};

/// The prompt synthesised from the catalog and handed to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPrompt {
    pub text: String,
}

/// One candidate returned by the oracle, before re-location against the
/// normalized text. `kind`/`label` are carried as plain strings here
/// because the oracle may report a label the catalog does not recognise;
/// such candidates are dropped during re-location.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleCandidate {
    pub kind: OracleKind,
    pub label: String,
    pub surface: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleKind {
    Subject,
    Predicate,
}

/// Builds the prompt sent to the oracle from the catalog's subject and
/// predicate definitions: label, description and examples for each.
pub fn build_prompt(catalog: &Catalog) -> ExtractionPrompt {
    let mut text = String::new();
    text.push_str("Identify spans matching the following entity and event types.\n\n");
    for subject in &catalog.subjects {
        text.push_str(&format!("- SUBJECT {}", subject.label));
        if let Some(description) = &subject.description {
            text.push_str(&format!(": {}", description));
        }
        text.push('\n');
        for example in &subject.examples {
            text.push_str(&format!("  e.g. \"{}\"\n", example));
        }
    }
    for predicate in &catalog.predicates {
        text.push_str(&format!("- PREDICATE {}", predicate.label));
        if let Some(description) = &predicate.description {
            text.push_str(&format!(": {}", description));
        }
        text.push('\n');
        for example in &predicate.examples {
            text.push_str(&format!("  e.g. \"{}\"\n", example));
        }
    }
    ExtractionPrompt { text }
}

/// The external entity extractor. The core never trusts the offsets an
/// implementation reports; see [`crate::relocate_oracle_candidates`].
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        prompt: &ExtractionPrompt,
        timeout: Duration,
    ) -> Result<Vec<OracleCandidate>, DetectError>;
}

/// An extractor that never finds anything, for regex-only deployments.
pub struct NullExtractor;

impl Extractor for NullExtractor {
    fn extract(
        &self,
        _text: &str,
        _prompt: &ExtractionPrompt,
        _timeout: Duration,
    ) -> Result<Vec<OracleCandidate>, DetectError> {
        Ok(Vec::new())
    }
}

/// An extractor that returns a fixed candidate list, for tests and
/// fixtures that stand in for a real network-backed oracle.
pub struct StaticExtractor {
    pub candidates: Vec<OracleCandidate>,
}

impl StaticExtractor {
    pub fn new(candidates: Vec<OracleCandidate>) -> Self {
        Self { candidates }
    }
}

impl Extractor for StaticExtractor {
    fn extract(
        &self,
        _text: &str,
        _prompt: &ExtractionPrompt,
        _timeout: Duration,
    ) -> Result<Vec<OracleCandidate>, DetectError> {
        Ok(self.candidates.clone())
    }
}
