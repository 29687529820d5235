//! The Binder: attaches eligible subject spans to a predicate detection
//! within its configured scope window, subject to a cardinality
//! constraint.

use warden_core::{BindClause, Cardinality, Proximity, Span, SpanKind};
use warden_normalize::{Paragraph, Sentence};

/// A half-open char range, or `None` for the whole-document scope.
type Window = Option<(usize, usize)>;

fn scope_window(
    predicate_start: usize,
    proximity: Proximity,
    paragraphs: &[Paragraph],
    sentences: &[Sentence],
) -> Window {
    match proximity {
        Proximity::Document => None,
        Proximity::Sentence => sentences
            .iter()
            .find(|s| s.start <= predicate_start && predicate_start < s.end)
            .map(|s| (s.start, s.end)),
        Proximity::Paragraph => paragraphs
            .iter()
            .find(|p| p.start <= predicate_start && predicate_start < p.end)
            .map(|p| (p.start, p.end)),
    }
}

fn in_window(span: &Span, window: Window) -> bool {
    match window {
        None => true,
        Some((start, end)) => span.start >= start && span.end <= end,
    }
}

/// The outcome of attempting to bind one predicate detection under one
/// policy's `bind` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Indices into the `spans` slice passed to [`bind`], one per distinct
    /// subject surface selected, in order of first appearance in scope.
    pub bound_span_indices: Vec<usize>,
}

/// Attempts to bind `predicate` to subjects in `spans` under `clause`.
/// Returns `None` if the cardinality constraint is not satisfied; the
/// predicate is then unmatched for the policy that supplied this clause,
/// though the subject detections remain eligible for other policies.
pub fn bind(
    predicate: &Span,
    spans: &[Span],
    clause: &BindClause,
    paragraphs: &[Paragraph],
    sentences: &[Sentence],
) -> Option<Binding> {
    let window = scope_window(predicate.start, clause.proximity, paragraphs, sentences);

    let mut bound_span_indices = Vec::new();
    let mut seen_surfaces: Vec<&str> = Vec::new();

    for (idx, span) in spans.iter().enumerate() {
        if span.kind != SpanKind::Subj {
            continue;
        }
        let label = match &span.label {
            warden_core::SpanLabel::Subject(label) => label,
            _ => continue,
        };
        if !clause.subjects.contains(label) {
            continue;
        }
        if !in_window(span, window) {
            continue;
        }
        let surface = span.canonical_surface();
        if seen_surfaces.contains(&surface) {
            continue;
        }
        seen_surfaces.push(surface);
        bound_span_indices.push(idx);
    }

    if clause.cardinality.is_satisfied_by(seen_surfaces.len()) {
        Some(Binding { bound_span_indices })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{SpanKind, SpanLabel, SpanSource, SubjectLabel};

    fn subj(label: &str, start: usize, end: usize) -> Span {
        Span {
            kind: SpanKind::Subj,
            label: SpanLabel::Subject(SubjectLabel::new(label)),
            start,
            end,
            surface: "x".repeat(end - start),
            confidence: 1.0,
            source: SpanSource::Regex,
        }
    }

    fn pred(start: usize, end: usize) -> Span {
        Span {
            kind: SpanKind::Pred,
            label: SpanLabel::Predicate("FINANCIAL_EVENT".into()),
            start,
            end,
            surface: "x".repeat(end - start),
            confidence: 1.0,
            source: SpanSource::Regex,
        }
    }

    #[test]
    fn binds_when_cardinality_satisfied() {
        let predicate = pred(20, 30);
        let spans = vec![subj("COMPANY", 0, 5), predicate.clone()];
        let sentences = vec![Sentence { start: 0, end: 30, paragraph_idx: 0 }];
        let clause = BindClause {
            subjects: vec![SubjectLabel::new("COMPANY")],
            proximity: Proximity::Sentence,
            cardinality: Cardinality::AtLeast(1),
            min_confidence: None,
        };
        let binding = bind(&predicate, &spans, &clause, &[], &sentences).unwrap();
        assert_eq!(binding.bound_span_indices, vec![0]);
    }

    #[test]
    fn fails_cardinality_when_too_few_subjects() {
        let predicate = pred(20, 30);
        let spans = vec![subj("COMPANY", 0, 5), predicate.clone()];
        let sentences = vec![Sentence { start: 0, end: 30, paragraph_idx: 0 }];
        let clause = BindClause {
            subjects: vec![SubjectLabel::new("COMPANY")],
            proximity: Proximity::Sentence,
            cardinality: Cardinality::AtLeast(2),
            min_confidence: None,
        };
        assert!(bind(&predicate, &spans, &clause, &[], &sentences).is_none());
    }

    #[test]
    fn scope_excludes_subjects_outside_sentence() {
        let predicate = pred(40, 50);
        let spans = vec![subj("COMPANY", 0, 5), predicate.clone()];
        let sentences = vec![
            Sentence { start: 0, end: 10, paragraph_idx: 0 },
            Sentence { start: 10, end: 50, paragraph_idx: 0 },
        ];
        let clause = BindClause {
            subjects: vec![SubjectLabel::new("COMPANY")],
            proximity: Proximity::Sentence,
            cardinality: Cardinality::AtLeast(1),
            min_confidence: None,
        };
        assert!(bind(&predicate, &spans, &clause, &[], &sentences).is_none());
    }
}
