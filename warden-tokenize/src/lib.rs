//! The Tokenizer: derives opaque, deterministic placeholder identifiers
//! for detections selected for TOKENIZE, under a keyed hash so the mapping
//! cannot be inverted without `secret_key`.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use warden_core::{SpanKind, TokenFormat};

/// Separator between `label` and `canonical` in the hash input, chosen to
/// never appear in a catalog label.
const FIELD_SEP: u8 = 0x1f;

/// Context string for widening a non-32-byte secret into BLAKE3's key size.
const KEY_DERIVATION_CONTEXT: &str = "warden-rs tokenize key v1";

/// Alphabet for opaque ids: digits and uppercase letters, excluding the
/// visually ambiguous `0`, `1`, `I`, `O`. 32 symbols, 5 bits per character.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

const DEFAULT_ID_BITS: u32 = 50;
const DEFAULT_ID_CHARS: usize = 10;
const WIDENED_ID_BITS: u32 = 60;
const WIDENED_ID_CHARS: usize = 12;

fn kind_str(kind: SpanKind) -> &'static str {
    match kind {
        SpanKind::Subj => "SUBJ",
        SpanKind::Pred => "PRED",
    }
}

fn derive_key(secret_key: &SecretString) -> [u8; 32] {
    let bytes = secret_key.expose_secret().as_bytes();
    if bytes.len() == 32 {
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        key
    } else {
        blake3::derive_key(KEY_DERIVATION_CONTEXT, bytes)
    }
}

fn hash_pair(key: &[u8; 32], label: &str, canonical: &str) -> [u8; 32] {
    let mut input = Vec::with_capacity(label.len() + 1 + canonical.len());
    input.extend_from_slice(label.as_bytes());
    input.push(FIELD_SEP);
    input.extend_from_slice(canonical.as_bytes());
    *blake3::keyed_hash(key, &input).as_bytes()
}

/// When `surface` (minus `-`/space separators) is entirely digits and `*`
/// mask characters with at least 4 digits present, returns the trailing 4
/// digits as a mask-insensitive key - the same key for a masked PAN
/// (`4111-****-****-1111`) and its unmasked form (`4111-1111-1111-1111`).
/// Returns `None` for anything that isn't shaped like a masked/full numeric
/// sequence, so ordinary text surfaces are never affected.
fn mask_normalized_key(surface: &str) -> Option<String> {
    let stripped: String = surface.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit() || c == '*') {
        return None;
    }
    let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].to_string())
}

fn leading_u64(hash: &[u8; 32]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash[0..8]);
    u64::from_be_bytes(buf)
}

fn encode_base32(value: u64, num_chars: usize) -> String {
    let mut out = vec![0u8; num_chars];
    let mut v = value;
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(v & 0x1f) as usize];
        v >>= 5;
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

fn opaque_id(value: u64, widened: bool) -> String {
    if widened {
        encode_base32(value & ((1u64 << WIDENED_ID_BITS) - 1), WIDENED_ID_CHARS)
    } else {
        encode_base32(value & ((1u64 << DEFAULT_ID_BITS) - 1), DEFAULT_ID_CHARS)
    }
}

/// Renders a placeholder for one tokenized detection.
pub fn render_placeholder(kind: SpanKind, label: &str, id: &str, format: TokenFormat) -> String {
    match format {
        TokenFormat::Bracket => format!("[[{}:{}:{}]]", kind_str(kind), label, id),
        TokenFormat::Markdown => format!("`[{}:{}:{}]`", kind_str(kind), label, id),
    }
}

/// Holds the derived key for one firewall configuration. Cheap to clone;
/// intended to live as long as the `Firewall` handle that owns it.
#[derive(Clone)]
pub struct Tokenizer {
    key: [u8; 32],
    format: TokenFormat,
    mask_aware_tokenization: bool,
}

impl Tokenizer {
    pub fn new(secret_key: &SecretString, format: TokenFormat) -> Self {
        Self::with_mask_aware_tokenization(secret_key, format, false)
    }

    /// Resolves the masked-credit-card open question: when `mask_aware` is
    /// true, a masked PAN and its unmasked form hash to the same canonical
    /// key (see `mask_normalized_key`); when false (the default) they are
    /// distinct surfaces and never share a token.
    pub fn with_mask_aware_tokenization(
        secret_key: &SecretString,
        format: TokenFormat,
        mask_aware: bool,
    ) -> Self {
        Tokenizer { key: derive_key(secret_key), format, mask_aware_tokenization: mask_aware }
    }

    pub fn format(&self) -> TokenFormat {
        self.format
    }

    /// Starts a new per-request tokenization session. A session memoizes
    /// `(kind, label, canonical)` to `opaque_id` for the lifetime of one
    /// evaluation and widens the encoding on an observed collision between
    /// two distinct pairs.
    pub fn session(&self) -> TokenSession<'_> {
        TokenSession { tokenizer: self, by_pair: HashMap::new(), by_id: HashMap::new() }
    }
}

type PairKey = (SpanKind, String, String);

/// A single firewall evaluation's tokenization state. Not shared across
/// requests: its only job is to guarantee that two distinct subjects
/// don't collide onto the same placeholder within one rewrite.
pub struct TokenSession<'a> {
    tokenizer: &'a Tokenizer,
    by_pair: HashMap<PairKey, String>,
    by_id: HashMap<String, PairKey>,
}

impl TokenSession<'_> {
    /// Returns the opaque id for `(kind, label, canonical)`, reusing a
    /// prior result for the identical triple and widening the encoding if
    /// the default-length id would otherwise collide with a different
    /// triple already issued in this session.
    pub fn token_id(&mut self, kind: SpanKind, label: &str, canonical: &str) -> String {
        let canonical_key = if self.tokenizer.mask_aware_tokenization {
            mask_normalized_key(canonical).unwrap_or_else(|| canonical.to_string())
        } else {
            canonical.to_string()
        };
        let pair_key: PairKey = (kind, label.to_string(), canonical_key.clone());
        if let Some(existing) = self.by_pair.get(&pair_key) {
            return existing.clone();
        }

        let hash = hash_pair(&self.tokenizer.key, label, &canonical_key);
        let value = leading_u64(&hash);
        let mut id = opaque_id(value, false);
        if self.by_id.get(&id).is_some_and(|other| other != &pair_key) {
            id = opaque_id(value, true);
        }

        self.by_pair.insert(pair_key.clone(), id.clone());
        self.by_id.insert(id.clone(), pair_key);
        id
    }

    /// Renders the placeholder text for `(kind, label, canonical)`, in the
    /// session's configured format.
    pub fn placeholder(&mut self, kind: SpanKind, label: &str, canonical: &str) -> String {
        let id = self.token_id(kind, label, canonical);
        render_placeholder(kind, label, &id, self.tokenizer.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokenizer(secret: &str) -> Tokenizer {
        Tokenizer::new(&SecretString::from(secret.to_string()), TokenFormat::Bracket)
    }

    #[test]
    fn identical_pair_yields_identical_id() {
        let t = tokenizer("k1");
        let mut session = t.session();
        let a = session.token_id(SpanKind::Subj, "EMAIL", "alice@example.com");
        let b = session.token_id(SpanKind::Subj, "EMAIL", "alice@example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_yield_different_ids() {
        let t1 = tokenizer("k1");
        let t2 = tokenizer("k2");
        let a = t1.session().token_id(SpanKind::Subj, "EMAIL", "alice@example.com");
        let b = t2.session().token_id(SpanKind::Subj, "EMAIL", "alice@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn masked_and_full_pan_share_a_token_when_mask_aware() {
        let t = Tokenizer::with_mask_aware_tokenization(
            &SecretString::from("k1".to_string()),
            TokenFormat::Bracket,
            true,
        );
        let masked = t.session().token_id(SpanKind::Subj, "ACCOUNT_NUMBER", "4111-****-****-1111");
        let full = t.session().token_id(SpanKind::Subj, "ACCOUNT_NUMBER", "4111-1111-1111-1111");
        assert_eq!(masked, full);
    }

    #[test]
    fn masked_and_full_pan_differ_by_default() {
        let t = tokenizer("k1");
        let masked = t.session().token_id(SpanKind::Subj, "ACCOUNT_NUMBER", "4111-****-****-1111");
        let full = t.session().token_id(SpanKind::Subj, "ACCOUNT_NUMBER", "4111-1111-1111-1111");
        assert_ne!(masked, full);
    }

    #[test]
    fn id_uses_only_restricted_alphabet() {
        let t = tokenizer("k1");
        let id = t.session().token_id(SpanKind::Subj, "EMAIL", "bob@example.com");
        assert_eq!(id.len(), DEFAULT_ID_CHARS);
        assert!(id.chars().all(|c| ALPHABET.contains(&(c as u8))));
        assert!(!id.contains(['0', '1', 'I', 'O']));
    }

    #[test]
    fn placeholder_renders_bracket_format() {
        let t = tokenizer("k1");
        let placeholder = t.session().placeholder(SpanKind::Subj, "EMAIL", "alice@example.com");
        assert!(placeholder.starts_with("[[SUBJ:EMAIL:"));
        assert!(placeholder.ends_with("]]"));
    }

    #[test]
    fn placeholder_renders_markdown_format() {
        let t = Tokenizer::new(&SecretString::from("k1".to_string()), TokenFormat::Markdown);
        let placeholder = t.session().placeholder(SpanKind::Pred, "FINANCIAL_EVENT", "raised a round");
        assert!(placeholder.starts_with("`[PRED:FINANCIAL_EVENT:"));
        assert!(placeholder.ends_with("]`"));
    }

    #[test]
    fn short_key_is_widened_via_derivation() {
        let t = tokenizer("short");
        let id = t.session().token_id(SpanKind::Subj, "EMAIL", "carol@example.com");
        assert_eq!(id.len(), DEFAULT_ID_CHARS);
    }

    proptest! {
        /// Invariant 1 (determinism) and 6 (token stability): the same
        /// `(key, label, canonical)` triple always maps to the same id,
        /// across fresh sessions and fresh tokenizer instances alike.
        #[test]
        fn same_triple_is_always_stable(
            key in "[a-zA-Z0-9]{4,40}",
            label in "[A-Z][A-Z_]{1,12}",
            canonical in "[a-zA-Z0-9@. ]{1,40}",
        ) {
            let t = tokenizer(&key);
            let a = t.session().token_id(SpanKind::Subj, &label, &canonical);
            let b = t.session().token_id(SpanKind::Subj, &label, &canonical);
            prop_assert_eq!(a, b);
        }

        /// The id alphabet is always the restricted 32-symbol set, regardless
        /// of input.
        #[test]
        fn id_is_always_in_alphabet(
            key in "[a-zA-Z0-9]{4,40}",
            label in "[A-Z][A-Z_]{1,12}",
            canonical in "[a-zA-Z0-9@. ]{1,40}",
        ) {
            let t = tokenizer(&key);
            let id = t.session().token_id(SpanKind::Subj, &label, &canonical);
            prop_assert!(id.chars().all(|c| ALPHABET.contains(&(c as u8))));
        }

        /// Two distinct triples issued within the same session never collapse
        /// to the same id (the session widens on any observed collision).
        #[test]
        fn distinct_triples_within_a_session_never_collide(
            key in "[a-zA-Z0-9]{4,40}",
            canonical_a in "[a-zA-Z0-9@. ]{1,40}",
            canonical_b in "[a-zA-Z0-9@. ]{1,40}",
        ) {
            prop_assume!(canonical_a != canonical_b);
            let t = tokenizer(&key);
            let mut session = t.session();
            let a = session.token_id(SpanKind::Subj, "EMAIL", &canonical_a);
            let b = session.token_id(SpanKind::Subj, "EMAIL", &canonical_b);
            prop_assert_ne!(a, b);
        }
    }
}
