//! Span types shared between the Detector, Span Resolver, Binder and
//! Rewriter.

use serde::{Deserialize, Serialize};

use crate::{PredicateLabel, SubjectLabel};

/// Whether a span names a subject entity or a predicate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    Subj,
    Pred,
}

/// Which detector produced a candidate span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanSource {
    Regex,
    Oracle,
}

/// A label shared by subject and predicate spans. Subjects carry
/// `SubjectLabel`, predicates carry `PredicateLabel`; both render the same
/// way so the Resolver and Rewriter can treat them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpanLabel {
    Subject(SubjectLabel),
    Predicate(PredicateLabel),
}

impl SpanLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SpanLabel::Subject(label) => label.as_str(),
            SpanLabel::Predicate(label) => label.as_str(),
        }
    }
}

impl std::fmt::Display for SpanLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A half-open character range over the NFKC-normalized text, tagged with
/// the detection that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub kind: SpanKind,
    pub label: SpanLabel,
    /// Start offset, in chars, inclusive.
    pub start: usize,
    /// End offset, in chars, exclusive.
    pub end: usize,
    /// The literal text this span covers, post-normalization.
    pub surface: String,
    pub confidence: f32,
    pub source: SpanSource,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether `self` and `other` share at least one character.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `self` is wholly contained within `other` (equal spans count).
    pub fn contained_in(&self, other: &Span) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    /// NFKC surface with surrounding whitespace trimmed, used as the
    /// canonical tokenization input (see `warden-tokenize`).
    pub fn canonical_surface(&self) -> &str {
        self.surface.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span {
            kind: SpanKind::Subj,
            label: SpanLabel::Subject(SubjectLabel::new("PERSON")),
            start,
            end,
            surface: "x".repeat(end - start),
            confidence: 1.0,
            source: SpanSource::Regex,
        }
    }

    #[test]
    fn overlap_requires_shared_character() {
        assert!(span(0, 5).overlaps(&span(4, 8)));
        assert!(!span(0, 5).overlaps(&span(5, 8)));
    }

    #[test]
    fn containment_is_reflexive() {
        let a = span(0, 5);
        assert!(a.contained_in(&a));
        assert!(span(1, 3).contained_in(&span(0, 5)));
        assert!(!span(0, 6).contained_in(&span(0, 5)));
    }
}
