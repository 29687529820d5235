//! The Span Resolver: confidence filtering, deduplication, overlap
//! resolution and placeholder immunity over the candidate spans the
//! Detector produced.

use once_cell::sync::Lazy;
use regex::Regex;
use warden_core::{
    PolicySet, PredicateLabel, Span, SpanKind, SpanLabel, SpanSource, SubjectLabel, WhenClause,
};

use crate::OracleCandidate;

/// Re-locates oracle candidates against the normalized text. The oracle's
/// reported offsets are a hint only: this looks for the reported surface
/// text and, when it occurs more than once, picks the occurrence nearest
/// the reported start. Candidates whose surface cannot be found at all are
/// dropped silently with a debug record - never logging the surface text
/// itself.
pub fn relocate_oracle_candidates(text: &str, candidates: Vec<OracleCandidate>) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let needle: Vec<char> = candidate.surface.chars().collect();
        if needle.is_empty() {
            continue;
        }
        let occurrences = find_all_occurrences(&chars, &needle);
        let Some(best_start) = occurrences
            .into_iter()
            .min_by_key(|&start| (start as i64 - candidate.start as i64).abs())
        else {
            tracing::debug!(
                label = %candidate.label,
                reported_start = candidate.start,
                "oracle candidate surface not found in normalized text, dropping"
            );
            continue;
        };

        let kind = match candidate.kind {
            crate::OracleKind::Subject => SpanKind::Subj,
            crate::OracleKind::Predicate => SpanKind::Pred,
        };
        let label = match candidate.kind {
            crate::OracleKind::Subject => SpanLabel::Subject(SubjectLabel::new(candidate.label)),
            crate::OracleKind::Predicate => {
                SpanLabel::Predicate(PredicateLabel::new(candidate.label))
            }
        };

        spans.push(Span {
            kind,
            label,
            start: best_start,
            end: best_start + needle.len(),
            surface: candidate.surface,
            confidence: candidate.confidence,
            source: SpanSource::Oracle,
        });
    }
    spans
}

fn find_all_occurrences(haystack: &[char], needle: &[char]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    (0..=(haystack.len() - needle.len()))
        .filter(|&i| &haystack[i..i + needle.len()] == needle)
        .collect()
}

fn label_thresholds(label: &SpanLabel, policies: &PolicySet) -> Vec<Option<f32>> {
    let mut thresholds = Vec::new();
    for policy in &policies.policies {
        match (&policy.when, label) {
            (WhenClause::Subjects { subjects, min_confidence }, SpanLabel::Subject(l)) => {
                if subjects.contains(l) {
                    thresholds.push(*min_confidence);
                }
            }
            (WhenClause::Predicate { predicate, min_confidence, .. }, SpanLabel::Predicate(l)) => {
                if predicate == l {
                    thresholds.push(*min_confidence);
                }
            }
            (WhenClause::Predicate { bind: Some(bind), .. }, SpanLabel::Subject(l)) => {
                if bind.subjects.contains(l) {
                    thresholds.push(bind.min_confidence);
                }
            }
            _ => {}
        }
    }
    thresholds
}

/// Drops spans whose confidence falls below every applicable policy's
/// threshold (or the default threshold, if no policy matches the label at
/// all). A span survives if it clears at least one applicable policy's
/// threshold.
pub fn confidence_filter(spans: Vec<Span>, policies: &PolicySet, default_threshold: f32) -> Vec<Span> {
    spans
        .into_iter()
        .filter(|span| {
            let thresholds = label_thresholds(&span.label, policies);
            if thresholds.is_empty() {
                span.confidence >= default_threshold
            } else {
                let easiest = thresholds
                    .into_iter()
                    .map(|t| t.unwrap_or(default_threshold))
                    .fold(f32::INFINITY, f32::min);
                span.confidence >= easiest
            }
        })
        .collect()
}

/// Collapses spans with identical `(label, start, end)`, keeping the
/// higher confidence and preferring the regex source on ties.
pub fn dedup(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| {
        (a.label.as_str(), a.start, a.end).cmp(&(b.label.as_str(), b.start, b.end))
    });
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = out.last_mut() {
            if last.label == span.label && last.start == span.start && last.end == span.end {
                let replace = span.confidence > last.confidence
                    || (span.confidence == last.confidence
                        && span.source == SpanSource::Regex
                        && last.source != SpanSource::Regex);
                if replace {
                    *last = span;
                }
                continue;
            }
        }
        out.push(span);
    }
    out
}

/// Resolves overlaps: same-label overlaps keep the longest span (ties by
/// confidence, then earliest start); different-label overlaps are both
/// kept as complementary detections.
pub fn resolve_overlaps(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));
    let mut kept: Vec<Span> = Vec::new();

    'outer: for span in spans {
        let mut i = 0;
        while i < kept.len() {
            if kept[i].label == span.label && kept[i].overlaps(&span) {
                let keep_existing = kept[i].len() > span.len()
                    || (kept[i].len() == span.len() && kept[i].confidence >= span.confidence);
                if keep_existing {
                    continue 'outer;
                } else {
                    kept.remove(i);
                    continue;
                }
            }
            i += 1;
        }
        kept.push(span);
    }
    kept.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    kept
}

static PLACEHOLDER_PATTERN: &str =
    r"\[\[(?:SUBJ|PRED):[A-Z_]+:[A-HJ-NP-Z2-9]{10,12}\]\]|`\[(?:SUBJ|PRED):[A-Z_]+:[A-HJ-NP-Z2-9]{10,12}\]`";

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"));

/// Half-open char ranges of any pre-existing token placeholder in `text`.
pub fn find_placeholder_ranges(text: &str) -> Vec<std::ops::Range<usize>> {
    let regex = &*PLACEHOLDER_REGEX;
    let mut char_offset_of = vec![0usize; text.len() + 1];
    let mut char_idx = 0;
    for (byte_idx, _) in text.char_indices() {
        char_offset_of[byte_idx] = char_idx;
        char_idx += 1;
    }
    char_offset_of[text.len()] = char_idx;

    regex
        .find_iter(text)
        .map(|m| char_offset_of[m.start()]..char_offset_of[m.end()])
        .collect()
}

/// Discards candidate spans that fall wholly inside an existing token
/// placeholder; the placeholder itself is left untouched downstream.
pub fn placeholder_immunity(spans: Vec<Span>, text: &str) -> Vec<Span> {
    let placeholders = find_placeholder_ranges(text);
    spans
        .into_iter()
        .filter(|span| {
            !placeholders
                .iter()
                .any(|p| p.start <= span.start && span.end <= p.end)
        })
        .collect()
}

/// Runs the full resolver pipeline in the order the design specifies:
/// confidence filter, dedup, overlap resolution, placeholder immunity.
pub fn resolve(
    spans: Vec<Span>,
    text: &str,
    policies: &PolicySet,
    default_threshold: f32,
) -> Vec<Span> {
    let spans = confidence_filter(spans, policies, default_threshold);
    let spans = dedup(spans);
    let spans = resolve_overlaps(spans);
    placeholder_immunity(spans, text)
}
