//! Fixtures and `proptest` strategies shared across the firewall's crates,
//! mirroring the arbitrary-value generators this family keeps in one
//! dedicated test-support crate rather than duplicated per test module.

use proptest::prelude::*;
use warden_core::{Catalog, PredicateDef, SubjectDef, SubjectLabel};

/// A small catalog covering one subject with a regex pattern and one
/// predicate, enough to exercise the full pipeline without a fixture file.
pub fn sample_catalog() -> Catalog {
    Catalog {
        subjects: vec![
            SubjectDef {
                label: SubjectLabel::new("EMAIL"),
                patterns: vec![r"[\w.+-]+@[\w-]+\.[\w.-]+".to_string()],
                description: Some("an email address".to_string()),
                examples: vec!["alice@example.com".to_string()],
            },
            SubjectDef {
                label: SubjectLabel::new("COMPANY"),
                patterns: vec![r"\b[A-Z][a-zA-Z]+ (?:Corp|Inc|LLC)\b".to_string()],
                description: Some("a named company".to_string()),
                examples: vec!["Acme Corp".to_string()],
            },
        ],
        predicates: vec![PredicateDef {
            label: "FINANCIAL_EVENT".into(),
            description: Some("a financial transaction or filing".to_string()),
            examples: vec!["raised a funding round".to_string()],
            related_subjects: vec![SubjectLabel::new("COMPANY")],
        }],
    }
}

/// An uppercase-alphanumeric catalog-style label, e.g. `"PERSON"`.
pub fn arb_label() -> impl Strategy<Value = String> {
    "[A-Z][A-Z_]{1,12}"
}

/// A confidence score in `[0.0, 1.0]`.
pub fn arb_confidence() -> impl Strategy<Value = f32> {
    0.0f32..=1.0f32
}

/// A short span of plain ASCII words, useful for exercising the Normalizer
/// and segmenter without needing real sentences.
pub fn arb_plain_text() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z]{2,8}", 1..12).prop_map(|words| words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_has_compilable_patterns() {
        let catalog = sample_catalog();
        for subject in &catalog.subjects {
            for pattern in &subject.patterns {
                assert!(regex_lite_is_valid(pattern));
            }
        }
    }

    fn regex_lite_is_valid(pattern: &str) -> bool {
        // This crate doesn't depend on `regex` directly; a parse attempt
        // via a minimal check is enough to catch an obviously malformed
        // fixture pattern without adding the dependency just for this.
        !pattern.is_empty() && pattern.matches('(').count() == pattern.matches(')').count()
    }
}
