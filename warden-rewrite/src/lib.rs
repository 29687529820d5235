//! The Rewriter: splices tokenizer placeholders into normalized text and
//! verifies the allow-unchanged invariant on the result.

use std::collections::HashSet;

use warden_core::{RewriteError, Span};
use warden_detect::find_placeholder_ranges;
use warden_normalize::find_quoted_ranges;

/// One span selected by the Policy Engine for replacement, already carrying
/// its rendered placeholder text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementSpan {
    pub start: usize,
    pub end: usize,
    pub placeholder: String,
}

/// Splices `spans` into `text`, discarding any span wholly overlapped by an
/// earlier, outermost selection. `spans` need not be pre-sorted.
pub fn splice(text: &str, spans: &[ReplacementSpan]) -> String {
    let chars: Vec<char> = text.chars().collect();

    let mut ordered = spans.to_vec();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));

    let mut selected: Vec<ReplacementSpan> = Vec::with_capacity(ordered.len());
    for span in ordered {
        if let Some(last) = selected.last() {
            if span.start < last.end {
                continue;
            }
        }
        selected.push(span);
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for span in &selected {
        out.extend(&chars[cursor..span.start]);
        out.push_str(&span.placeholder);
        cursor = span.end;
    }
    out.extend(&chars[cursor..]);
    out
}

/// Builds the allow-unchanged literal set: money and date span surfaces,
/// quoted passages, pre-existing placeholders, plus caller-supplied
/// `preserve_literals`.
pub fn collect_preserved_literals(
    text: &str,
    money_and_date_spans: &[Span],
    preserve_literals: &[String],
) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut literals = Vec::new();

    for span in money_and_date_spans {
        literals.push(span.canonical_surface().to_string());
    }
    for range in find_quoted_ranges(text) {
        literals.push(chars[range.start..range.end].iter().collect());
    }
    for range in find_placeholder_ranges(text) {
        literals.push(chars[range.start..range.end].iter().collect());
    }
    literals.extend(preserve_literals.iter().cloned());
    literals
}

/// Verifies every distinct literal in `literals` occurs the same number of
/// times in `output` as it did in `input`.
pub fn verify_literals_preserved(
    input: &str,
    output: &str,
    literals: &[String],
) -> Result<(), RewriteError> {
    let mut checked = HashSet::new();
    for literal in literals {
        if literal.is_empty() || !checked.insert(literal.as_str()) {
            continue;
        }
        let expected = input.matches(literal.as_str()).count();
        let actual = output.matches(literal.as_str()).count();
        if expected != actual {
            return Err(RewriteError::LiteralCountMismatch {
                literal: literal.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Splices `spans` into `text` and verifies the allow-unchanged invariant
/// against `preserved_literals` before returning the rewritten text.
pub fn rewrite(
    text: &str,
    spans: &[ReplacementSpan],
    preserved_literals: &[String],
) -> Result<String, RewriteError> {
    let output = splice(text, spans);
    verify_literals_preserved(text, &output, preserved_literals)?;
    Ok(output)
}
