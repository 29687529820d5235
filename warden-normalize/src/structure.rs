//! Quote and fenced-code-block detection shared by the Policy Engine's
//! `unless` guards and the Rewriter's allow-unchanged literal discovery.

use std::ops::Range;

/// Half-open char ranges of text that sits inside a matched pair of
/// quotes. Straight and typographic double quotes always count; a single
/// quote counts only when it is not adjacent to a letter (so it reads as a
/// delimiter rather than an apostrophe), matching the `unless.inQuote`
/// guard's intent.
pub fn find_quoted_ranges(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut open_quote: Option<char> = None;

    for (i, &ch) in chars.iter().enumerate() {
        let is_double = matches!(ch, '"' | '\u{201C}' | '\u{201D}');
        let is_eligible_single = ch == '\''
            && (i == 0 || !chars[i - 1].is_alphanumeric());

        if !is_double && !is_eligible_single {
            continue;
        }

        match open {
            None => {
                open = Some(i);
                open_quote = Some(ch);
            }
            Some(start) => {
                let matches_kind = match open_quote {
                    Some('"') | Some('\u{201C}') | Some('\u{201D}') => is_double,
                    Some('\'') => ch == '\'',
                    _ => false,
                };
                if matches_kind {
                    ranges.push(start..(i + 1));
                    open = None;
                    open_quote = None;
                }
            }
        }
    }
    ranges
}

/// Half-open char ranges of text fenced by triple backticks.
pub fn find_code_block_ranges(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let mut ranges = Vec::new();
    let mut fence_starts = Vec::new();
    let mut i = 0;
    while i + 2 < chars.len() {
        if chars[i] == '`' && chars[i + 1] == '`' && chars[i + 2] == '`' {
            fence_starts.push(i);
            i += 3;
        } else {
            i += 1;
        }
    }
    for pair in fence_starts.chunks(2) {
        if let [start, end] = pair {
            ranges.push(*start..(end + 3));
        }
    }
    ranges
}

pub fn is_in_quote(text: &str, char_idx: usize) -> bool {
    find_quoted_ranges(text)
        .iter()
        .any(|r| r.start <= char_idx && char_idx < r.end)
}

pub fn is_in_code_block(text: &str, char_idx: usize) -> bool {
    find_code_block_ranges(text)
        .iter()
        .any(|r| r.start <= char_idx && char_idx < r.end)
}

/// Whether `text` contains any of the configured public-record markers,
/// case-insensitively.
pub fn contains_public_record_marker(text: &str, markers: &[String]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| lower.contains(&m.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_double_quoted_range() {
        let ranges = find_quoted_ranges("say \"hello there\" now");
        assert_eq!(ranges.len(), 1);
        let r = &ranges[0];
        let quoted: String = "say \"hello there\" now".chars().collect::<Vec<_>>()[r.clone()]
            .iter()
            .collect();
        assert_eq!(quoted, "\"hello there\"");
    }

    #[test]
    fn apostrophe_is_not_treated_as_quote_delimiter() {
        let ranges = find_quoted_ranges("it's John's report");
        assert!(ranges.is_empty());
    }

    #[test]
    fn finds_fenced_code_block() {
        let text = "before ```let x = 1;``` after";
        let ranges = find_code_block_ranges(text);
        assert_eq!(ranges.len(), 1);
    }

    #[test]
    fn detects_public_record_marker() {
        let markers = vec!["PACER".to_string(), "public record".to_string()];
        assert!(contains_public_record_marker("Filed via PACER yesterday.", &markers));
        assert!(!contains_public_record_marker("Filed privately.", &markers));
    }
}
