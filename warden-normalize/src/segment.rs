//! Paragraph and sentence segmentation over normalized text.
//!
//! Sentence splitting is char-index based and Unicode-safe, following the
//! style of a first-sentence extractor that walks `char_indices` rather
//! than byte offsets; unlike that simpler extractor, this one also
//! respects common abbreviations and does not split inside quotes or
//! parentheses.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::find_quoted_ranges;

/// A half-open char range of one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paragraph {
    pub start: usize,
    pub end: usize,
}

/// A half-open char range of one sentence, tagged with the paragraph it
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence {
    pub start: usize,
    pub end: usize,
    pub paragraph_idx: usize,
}

static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "dr", "mr", "mrs", "ms", "prof", "sr", "jr", "inc", "ltd", "co", "corp", "vs", "etc",
        "e.g", "i.e", "u.s", "u.k", "u.n", "st", "gen", "rev", "capt", "col", "maj", "sgt",
    ]
    .into_iter()
    .collect()
});

/// Splits `text` into paragraphs on runs of two or more line terminators
/// (or blank lines).
pub fn segment_paragraphs(text: &str) -> Vec<Paragraph> {
    let chars: Vec<char> = text.chars().collect();
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut newline_run = 0;

    while i < chars.len() {
        if chars[i] == '\n' {
            newline_run += 1;
            if newline_run >= 2 {
                let boundary = i - (newline_run - 1);
                if boundary > start {
                    paragraphs.push(Paragraph { start, end: boundary });
                }
                start = i + 1;
            }
        } else {
            newline_run = 0;
        }
        i += 1;
    }
    if start < chars.len() {
        paragraphs.push(Paragraph { start, end: chars.len() });
    }
    if paragraphs.is_empty() && !chars.is_empty() {
        paragraphs.push(Paragraph { start: 0, end: chars.len() });
    }
    paragraphs
}

/// Returns true if the word ending at `end` (exclusive) in `chars` is a
/// known abbreviation, ignoring case and a trailing period.
fn ends_with_abbreviation(chars: &[char], end: usize) -> bool {
    let mut start = end;
    while start > 0 {
        let c = chars[start - 1];
        if c.is_whitespace() {
            break;
        }
        start -= 1;
    }
    let word: String = chars[start..end]
        .iter()
        .collect::<String>()
        .trim_end_matches('.')
        .to_ascii_lowercase();
    ABBREVIATIONS.contains(word.as_str())
}

/// Splits one paragraph's char range into sentences. Terminal `.`, `?`, `!`
/// followed by whitespace or end-of-text end a sentence, unless the
/// terminator follows a known abbreviation or falls inside a matched quote
/// or parenthesis pair.
fn segment_sentences_in_range(chars: &[char], start: usize, end: usize) -> Vec<(usize, usize)> {
    let quoted = find_quoted_ranges(&chars[start..end].iter().collect::<String>());
    let in_protected = |relative_idx: usize| -> bool {
        quoted.iter().any(|r| r.start <= relative_idx && relative_idx < r.end)
    };

    let mut paren_depth = 0i32;
    let mut sentences = Vec::new();
    let mut seg_start = start;
    let mut i = start;

    while i < end {
        let ch = chars[i];
        match ch {
            '(' | '[' => paren_depth += 1,
            ')' | ']' => paren_depth = (paren_depth - 1).max(0),
            '.' | '?' | '!' => {
                let relative = i - start;
                let next_is_boundary = i + 1 >= end || chars[i + 1].is_whitespace();
                if next_is_boundary
                    && paren_depth == 0
                    && !in_protected(relative)
                    && !(ch == '.' && ends_with_abbreviation(chars, i + 1))
                {
                    sentences.push((seg_start, i + 1));
                    seg_start = i + 1;
                    while seg_start < end && chars[seg_start].is_whitespace() {
                        seg_start += 1;
                    }
                    i = seg_start;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if seg_start < end {
        sentences.push((seg_start, end));
    }
    sentences
}

/// Segments `text` into paragraphs and, within each paragraph, sentences.
pub fn segment(text: &str) -> (Vec<Paragraph>, Vec<Sentence>) {
    let chars: Vec<char> = text.chars().collect();
    let paragraphs = segment_paragraphs(text);
    let mut sentences = Vec::new();
    for (idx, paragraph) in paragraphs.iter().enumerate() {
        for (start, end) in segment_sentences_in_range(&chars, paragraph.start, paragraph.end) {
            if start < end {
                sentences.push(Sentence {
                    start,
                    end,
                    paragraph_idx: idx,
                });
            }
        }
    }
    (paragraphs, sentences)
}
