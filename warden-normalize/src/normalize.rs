//! NFKC normalization with a best-effort source-offset map.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Normalized text plus a map from each normalized char index back to the
/// grapheme cluster in the original text it was produced from. NFKC can
/// expand or combine clusters, so the map is grapheme-granular rather than
/// a strict 1:1 offset - precise enough for the Rewriter to identify which
/// original region an unchanged span came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    pub normalized: String,
    /// `source_offsets[i]` is the char offset, in the original string, of
    /// the grapheme cluster that produced `normalized.chars().nth(i)`.
    pub source_offsets: Vec<usize>,
}

impl NormalizedText {
    pub fn char_count(&self) -> usize {
        self.source_offsets.len()
    }
}

/// Normalizes `input` to NFKC, walking extended grapheme clusters rather
/// than individual chars: a base character and a trailing combining mark
/// belong to the same cluster, which is what lets NFKC recompose an NFD
/// sequence (e.g. `e` + U+0301) back into its precomposed form (`é`).
/// Running NFKC over isolated chars would feed the mark through with no
/// preceding base to compose against.
pub fn normalize(input: &str) -> NormalizedText {
    let mut normalized = String::with_capacity(input.len());
    let mut source_offsets = Vec::with_capacity(input.len());

    let mut char_idx = 0;
    for grapheme in input.graphemes(true) {
        for out_ch in grapheme.nfkc() {
            normalized.push(out_ch);
            source_offsets.push(char_idx);
        }
        char_idx += grapheme.chars().count();
    }

    NormalizedText {
        normalized,
        source_offsets,
    }
}
