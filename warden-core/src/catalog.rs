//! Catalog document: the subject and predicate definitions policies refer
//! to. Loaded once at process start and treated as immutable afterward.
//!
//! Parsing uses `serde_yaml`/`toml`/`serde_json` for all three accepted
//! formats - no custom mini-syntax, the same posture the DSL config loader
//! this is grounded on takes toward its own documents.

use serde::{Deserialize, Serialize};

use crate::{CatalogError, PredicateLabel, SubjectLabel};

/// Subject label for automatically-detected monetary literals, part of the
/// allow-unchanged set the Rewriter preserves regardless of policy.
pub const MONEY_SUBJECT_LABEL: &str = "MONEY";

/// Subject label for automatically-detected date literals, part of the
/// allow-unchanged set the Rewriter preserves regardless of policy.
pub const DATE_SUBJECT_LABEL: &str = "DATE";

/// A subject entity definition: a label, optional regex patterns for the
/// Detector's regex path, and the natural-language description/examples
/// used to prompt the Extractor oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectDef {
    pub label: SubjectLabel,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// A predicate event/relation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateDef {
    pub label: PredicateLabel,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    /// Subject labels this predicate is expected to bind to; purely
    /// advisory unless a policy's `bind.subjects` narrows it further.
    #[serde(default)]
    pub related_subjects: Vec<SubjectLabel>,
}

/// Process-wide catalog of subject and predicate definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Catalog {
    pub subjects: Vec<SubjectDef>,
    pub predicates: Vec<PredicateDef>,
}

impl Catalog {
    pub fn subject(&self, label: &SubjectLabel) -> Option<&SubjectDef> {
        self.subjects.iter().find(|s| &s.label == label)
    }

    pub fn predicate(&self, label: &PredicateLabel) -> Option<&PredicateDef> {
        self.predicates.iter().find(|p| &p.label == label)
    }

    /// Merges in the built-in `MONEY`/`DATE` subject definitions used by
    /// the Rewriter's allow-unchanged literal discovery, unless the
    /// caller's own catalog already defines a subject under that label.
    pub fn with_builtin_subjects(mut self) -> Self {
        if self.subject(&SubjectLabel::new(MONEY_SUBJECT_LABEL)).is_none() {
            self.subjects.push(SubjectDef {
                label: SubjectLabel::new(MONEY_SUBJECT_LABEL),
                patterns: vec![
                    r"[$€£]\s?\d[\d,]*(?:\.\d+)?".to_string(),
                    r"\b\d[\d,]*(?:\.\d+)?\s?(?:USD|EUR|GBP)\b".to_string(),
                ],
                description: Some("a monetary amount".to_string()),
                examples: vec!["$500".to_string(), "1,200.50 USD".to_string()],
            });
        }
        if self.subject(&SubjectLabel::new(DATE_SUBJECT_LABEL)).is_none() {
            self.subjects.push(SubjectDef {
                label: SubjectLabel::new(DATE_SUBJECT_LABEL),
                patterns: vec![
                    r"\b\d{4}-\d{2}-\d{2}\b".to_string(),
                    r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December) \d{1,2},? \d{4}\b".to_string(),
                ],
                description: Some("a calendar date".to_string()),
                examples: vec!["2024-03-05".to_string(), "November 3, 2024".to_string()],
            });
        }
        self
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for subject in &self.subjects {
            for pattern in &subject.patterns {
                regex::Regex::new(pattern).map_err(|e| CatalogError::Malformed {
                    reason: format!(
                        "subject '{}' pattern '{}' does not compile: {}",
                        subject.label, pattern, e
                    ),
                })?;
            }
        }
        Ok(())
    }
}

/// Loads and structurally validates Catalog documents. Accepts YAML, TOML
/// or JSON by content, following the DSL config loader's "detect the
/// format, never invent one" convention.
pub struct CatalogLoader;

impl CatalogLoader {
    pub fn load_yaml(source: &str) -> Result<Catalog, CatalogError> {
        let catalog: Catalog =
            serde_yaml::from_str(source).map_err(|e| CatalogError::Malformed {
                reason: e.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load_toml(source: &str) -> Result<Catalog, CatalogError> {
        let catalog: Catalog = toml::from_str(source).map_err(|e| CatalogError::Malformed {
            reason: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load_json(source: &str) -> Result<Catalog, CatalogError> {
        let catalog: Catalog =
            serde_json::from_str(source).map_err(|e| CatalogError::Malformed {
                reason: e.to_string(),
            })?;
        catalog.validate()?;
        Ok(catalog)
    }
}
