//! Regex-path detection. Subject patterns are compiled once at
//! construction - like a runtime validating its config up front rather
//! than on every request - and reused across requests.

use regex::Regex;
use warden_core::{Catalog, DetectError, Span, SpanKind, SpanLabel, SpanSource, SubjectLabel};

/// Precompiled regex patterns for every subject label that declares one.
/// Built once when the catalog is loaded; immutable and shared across
/// requests thereafter.
pub struct RegexDetector {
    compiled: Vec<(SubjectLabel, Regex)>,
}

impl RegexDetector {
    pub fn new(catalog: &Catalog) -> Result<Self, DetectError> {
        let mut compiled = Vec::new();
        for subject in &catalog.subjects {
            for pattern in &subject.patterns {
                let regex = Regex::new(pattern).map_err(|e| DetectError::PatternCompile {
                    label: subject.label.to_string(),
                    reason: e.to_string(),
                })?;
                compiled.push((subject.label.clone(), regex));
            }
        }
        Ok(Self { compiled })
    }

    /// Scans `text` with every compiled pattern, producing candidate spans
    /// with `confidence = 1.0` and `source = regex`.
    pub fn detect(&self, text: &str) -> Vec<Span> {
        let char_offsets = byte_to_char_offsets(text);
        let mut spans = Vec::new();
        for (label, regex) in &self.compiled {
            for m in regex.find_iter(text) {
                spans.push(Span {
                    kind: SpanKind::Subj,
                    label: SpanLabel::Subject(label.clone()),
                    start: char_offsets[m.start()],
                    end: char_offsets[m.end()],
                    surface: m.as_str().to_string(),
                    confidence: 1.0,
                    source: SpanSource::Regex,
                });
            }
        }
        spans
    }
}

/// Maps every byte offset that can appear as a regex match boundary to its
/// char offset. Indexable at any valid UTF-8 boundary in `text`, including
/// `text.len()`.
fn byte_to_char_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0usize; text.len() + 1];
    let mut char_idx = 0;
    for (byte_idx, ch) in text.char_indices() {
        offsets[byte_idx] = char_idx;
        char_idx += 1;
        let _ = ch;
    }
    offsets[text.len()] = char_idx;
    offsets
}
