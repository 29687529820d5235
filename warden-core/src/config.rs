//! Process-wide configuration.
//!
//! ALL security-relevant values are required - no silent defaults for the
//! secret key or the confidence threshold, mirroring the "nothing
//! hard-coded" posture the validated configs in this family take.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::CatalogError;

/// How a tokenized placeholder is rendered into the output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    /// `[[KIND:LABEL:ID]]`
    Bracket,
    /// `` `[KIND:LABEL:ID]` ``
    Markdown,
}

impl Default for TokenFormat {
    fn default() -> Self {
        TokenFormat::Bracket
    }
}

/// Master configuration struct. `secret_key` and `default_confidence_threshold`
/// are required fields; there is deliberately no `Default` impl for the
/// whole struct, only for `TokenFormat` and the timeout/flag fields that
/// carry no security weight on their own.
#[derive(Debug, Clone, Deserialize)]
pub struct FirewallConfig {
    /// Key for the Tokenizer's keyed hash (see `warden-tokenize`). Widened
    /// to 32 bytes via BLAKE3 key derivation if not supplied at that exact
    /// length.
    pub secret_key: SecretString,
    pub default_confidence_threshold: f32,
    #[serde(default)]
    pub throw_on_deny: bool,
    #[serde(default)]
    pub token_format: TokenFormat,
    #[serde(default = "default_extractor_timeout_ms")]
    pub extractor_timeout_ms: u64,
    /// Resolves the masked-credit-card open question: masked and full
    /// surfaces are distinct canonical surfaces by default and never share
    /// a token unless this is set.
    #[serde(default)]
    pub mask_aware_tokenization: bool,
    /// Markers that satisfy the `unless.publicRecord` guard, e.g. `"PACER"`.
    #[serde(default)]
    pub public_record_markers: Vec<String>,
}

fn default_extractor_timeout_ms() -> u64 {
    5000
}

impl FirewallConfig {
    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - `secret_key` is non-empty
    /// - `default_confidence_threshold` in `[0.0, 1.0]`
    /// - `extractor_timeout_ms` > 0
    pub fn validate(&self) -> Result<(), CatalogError> {
        use secrecy::ExposeSecret;

        if self.secret_key.expose_secret().is_empty() {
            return Err(CatalogError::InvalidValue {
                field: "secret_key".to_string(),
                value: "<empty>".to_string(),
                reason: "secret_key must not be empty".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.default_confidence_threshold) {
            return Err(CatalogError::InvalidValue {
                field: "default_confidence_threshold".to_string(),
                value: self.default_confidence_threshold.to_string(),
                reason: "default_confidence_threshold must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.extractor_timeout_ms == 0 {
            return Err(CatalogError::InvalidValue {
                field: "extractor_timeout_ms".to_string(),
                value: self.extractor_timeout_ms.to_string(),
                reason: "extractor_timeout_ms must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Overlay environment variables on top of an already-valid config.
    /// Only non-secret, operational knobs are overridable this way; the
    /// secret key is never read from the environment by this helper to
    /// avoid it ending up in process listings or shell history.
    ///
    /// Recognised variables:
    /// - `WARDEN_DEFAULT_CONFIDENCE_THRESHOLD`
    /// - `WARDEN_THROW_ON_DENY`
    /// - `WARDEN_EXTRACTOR_TIMEOUT_MS`
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(threshold) = std::env::var("WARDEN_DEFAULT_CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.default_confidence_threshold = threshold;
        }
        if let Some(throw_on_deny) = std::env::var("WARDEN_THROW_ON_DENY")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.throw_on_deny = throw_on_deny;
        }
        if let Some(timeout_ms) = std::env::var("WARDEN_EXTRACTOR_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.extractor_timeout_ms = timeout_ms;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, threshold: f32) -> FirewallConfig {
        FirewallConfig {
            secret_key: SecretString::from(secret.to_string()),
            default_confidence_threshold: threshold,
            throw_on_deny: false,
            token_format: TokenFormat::Bracket,
            extractor_timeout_ms: 5000,
            mask_aware_tokenization: false,
            public_record_markers: Vec::new(),
        }
    }

    #[test]
    fn rejects_empty_secret_key() {
        assert!(config("", 0.5).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(config("k", 1.5).validate().is_err());
        assert!(config("k", -0.1).validate().is_err());
    }

    #[test]
    fn accepts_valid_config() {
        assert!(config("k", 0.5).validate().is_ok());
    }

    #[test]
    fn env_override_applies_only_recognised_keys() {
        std::env::set_var("WARDEN_EXTRACTOR_TIMEOUT_MS", "1234");
        let cfg = config("k", 0.5).apply_env_overrides();
        assert_eq!(cfg.extractor_timeout_ms, 1234);
        std::env::remove_var("WARDEN_EXTRACTOR_TIMEOUT_MS");
    }
}
