//! `unless` guard evaluation.

use warden_core::{Span, UnlessGuard};
use warden_normalize::{contains_public_record_marker, find_code_block_ranges, find_quoted_ranges, Sentence};

fn span_inside_any(span: &Span, ranges: &[std::ops::Range<usize>]) -> bool {
    ranges.iter().any(|r| r.start <= span.start && span.end <= r.end)
}

fn sentence_containing(span: &Span, sentences: &[Sentence]) -> Option<Sentence> {
    sentences
        .iter()
        .find(|s| s.start <= span.start && span.start < s.end)
        .copied()
}

/// Whether `guard` holds for `span` in the given text, suppressing the
/// policy that declared it.
pub fn guard_holds(
    guard: UnlessGuard,
    span: &Span,
    text: &str,
    sentences: &[Sentence],
    public_record_markers: &[String],
) -> bool {
    match guard {
        UnlessGuard::InQuote => {
            let Some(sentence) = sentence_containing(span, sentences) else {
                return false;
            };
            let chars: Vec<char> = text.chars().collect();
            let sentence_text: String = chars[sentence.start..sentence.end].iter().collect();
            let local_start = span.start - sentence.start;
            let local_end = span.end - sentence.start;
            find_quoted_ranges(&sentence_text)
                .iter()
                .any(|r| r.start <= local_start && local_end <= r.end)
        }
        UnlessGuard::InCodeBlock => span_inside_any(span, &find_code_block_ranges(text)),
        UnlessGuard::PublicRecord => {
            let Some(sentence) = sentence_containing(span, sentences) else {
                return false;
            };
            let chars: Vec<char> = text.chars().collect();
            let sentence_text: String = chars[sentence.start..sentence.end].iter().collect();
            contains_public_record_marker(&sentence_text, public_record_markers)
        }
    }
}

/// Whether any of `guards` suppresses the policy for `span`.
pub fn any_guard_holds(
    guards: &[UnlessGuard],
    span: &Span,
    text: &str,
    sentences: &[Sentence],
    public_record_markers: &[String],
) -> bool {
    guards
        .iter()
        .any(|g| guard_holds(*g, span, text, sentences, public_record_markers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{SpanKind, SpanLabel, SpanSource, SubjectLabel};

    fn span(start: usize, end: usize) -> Span {
        Span {
            kind: SpanKind::Subj,
            label: SpanLabel::Subject(SubjectLabel::new("COMPANY")),
            start,
            end,
            surface: "x".repeat(end - start),
            confidence: 1.0,
            source: SpanSource::Regex,
        }
    }

    #[test]
    fn in_quote_guard_detects_quoted_span() {
        let text = "said \"Acme Corp is having an IPO\" yesterday";
        let start = text.find("Acme").unwrap();
        let s = span(start, start + 9);
        let sentences = vec![Sentence { start: 0, end: text.chars().count(), paragraph_idx: 0 }];
        assert!(guard_holds(UnlessGuard::InQuote, &s, text, &sentences, &[]));
    }

    #[test]
    fn in_quote_guard_does_not_pair_across_sentences() {
        let text = "He said \"hello there. Acme Corp is having an IPO.";
        let start = text.find("Acme").unwrap();
        let s = span(start, start + 9);
        let sentences = vec![
            Sentence { start: 0, end: "He said \"hello there.".chars().count(), paragraph_idx: 0 },
            Sentence { start: "He said \"hello there.".chars().count(), end: text.chars().count(), paragraph_idx: 0 },
        ];
        assert!(!guard_holds(UnlessGuard::InQuote, &s, text, &sentences, &[]));
    }

    #[test]
    fn public_record_guard_checks_containing_sentence() {
        let text = "Filed via PACER. Acme Corp filed for an IPO.";
        let start = text.find("Acme").unwrap();
        let s = span(start, start + 4);
        let sentences = vec![
            Sentence { start: 0, end: 17, paragraph_idx: 0 },
            Sentence { start: 17, end: text.chars().count(), paragraph_idx: 0 },
        ];
        let markers = vec!["PACER".to_string()];
        assert!(!guard_holds(UnlessGuard::PublicRecord, &s, text, &sentences, &markers));
    }
}
