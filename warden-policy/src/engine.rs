//! The Policy Engine: matches detections against the policy set, applies
//! `unless` guards, and resolves the aggregate verdict.

use warden_bind::bind;
use warden_core::{Action, PolicyId, PolicySet, Span, SpanKind, SpanLabel, Targets, WhenClause};
use warden_normalize::{Paragraph, Sentence};

use crate::guard::any_guard_holds;

/// Per-span outcome once no policy has denied the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanDecision {
    pub tokenize: bool,
    /// Indices into the evaluated `spans` slice this predicate span bound,
    /// accumulated across every policy that bound it.
    pub bound_span_indices: Vec<usize>,
}

/// The result of one Policy Engine evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Deny {
        policy_id: PolicyId,
    },
    Resolved {
        decisions: Vec<SpanDecision>,
        applied_policy_ids: Vec<PolicyId>,
    },
}

/// Whether `policy`'s `when` clause matches `span`, honoring confidence and
/// (for predicate policies) the Binder's cardinality constraint. Returns
/// the bound subject indices when binding was attempted and succeeded, or
/// `Some(Vec::new())` when the policy matched without needing a binding.
fn matches(
    policy_when: &WhenClause,
    span: &Span,
    spans: &[Span],
    default_threshold: f32,
    paragraphs: &[Paragraph],
    sentences: &[Sentence],
) -> Option<Vec<usize>> {
    match (policy_when, &span.label, span.kind) {
        (WhenClause::Subjects { subjects, min_confidence }, SpanLabel::Subject(label), SpanKind::Subj) => {
            if subjects.contains(label) && span.confidence >= min_confidence.unwrap_or(default_threshold) {
                Some(Vec::new())
            } else {
                None
            }
        }
        (
            WhenClause::Predicate { predicate, bind: bind_clause, min_confidence },
            SpanLabel::Predicate(label),
            SpanKind::Pred,
        ) => {
            if predicate != label || span.confidence < min_confidence.unwrap_or(default_threshold) {
                return None;
            }
            match bind_clause {
                None => Some(Vec::new()),
                Some(clause) => bind(span, spans, clause, paragraphs, sentences)
                    .map(|binding| binding.bound_span_indices),
            }
        }
        _ => None,
    }
}

/// Evaluates every span in `spans` against `policies`. `spans` must already
/// have passed through the Span Resolver.
pub fn evaluate(
    spans: &[Span],
    text: &str,
    policies: &PolicySet,
    default_threshold: f32,
    paragraphs: &[Paragraph],
    sentences: &[Sentence],
    public_record_markers: &[String],
) -> Outcome {
    // Pass 1: any DENY anywhere halts the whole evaluation.
    for span in spans {
        for policy in &policies.policies {
            if !matches!(policy.then, Action::Deny) {
                continue;
            }
            if matches(&policy.when, span, spans, default_threshold, paragraphs, sentences).is_none() {
                continue;
            }
            if any_guard_holds(&policy.unless, span, text, sentences, public_record_markers) {
                continue;
            }
            return Outcome::Deny { policy_id: policy.id.clone() };
        }
    }

    // Pass 2: accumulate TOKENIZE contributions. Direct subject-policy
    // matches mark the subject span itself; predicate-policy matches mark
    // the predicate and/or its bound subjects according to `targets`.
    let mut decisions = vec![SpanDecision::default(); spans.len()];
    let mut applied_policy_ids = Vec::new();

    for (idx, span) in spans.iter().enumerate() {
        for policy in &policies.policies {
            let Action::Tokenize { targets } = &policy.then else {
                continue;
            };
            let Some(bound) = matches(&policy.when, span, spans, default_threshold, paragraphs, sentences)
            else {
                continue;
            };
            if any_guard_holds(&policy.unless, span, text, sentences, public_record_markers) {
                continue;
            }

            let mut applied = false;
            match span.kind {
                SpanKind::Subj => {
                    decisions[idx].tokenize = true;
                    applied = true;
                }
                SpanKind::Pred => {
                    if matches!(targets, Targets::Predicates | Targets::Both) {
                        decisions[idx].tokenize = true;
                        applied = true;
                    }
                    if matches!(targets, Targets::Subjects | Targets::Both) {
                        for &subj_idx in &bound {
                            decisions[subj_idx].tokenize = true;
                            if !decisions[idx].bound_span_indices.contains(&subj_idx) {
                                decisions[idx].bound_span_indices.push(subj_idx);
                            }
                        }
                        if !bound.is_empty() {
                            applied = true;
                        }
                    } else if !bound.is_empty() {
                        for &subj_idx in &bound {
                            if !decisions[idx].bound_span_indices.contains(&subj_idx) {
                                decisions[idx].bound_span_indices.push(subj_idx);
                            }
                        }
                    }
                }
            }
            if applied && !applied_policy_ids.contains(&policy.id) {
                applied_policy_ids.push(policy.id.clone());
            }
        }
    }

    Outcome::Resolved { decisions, applied_policy_ids }
}
