//! Error taxonomy.
//!
//! One `thiserror` enum per subsystem, folded into a single [`FirewallError`]
//! via `#[from]`. [`FirewallDenied`] is kept separate: a DENY verdict is an
//! expected outcome of policy evaluation, not a bug, so it does not live in
//! the error enum a caller would match on to find defects.

use thiserror::Error;

use crate::PolicyId;

/// Catalog or policy document failed to load or validate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog document is not valid YAML/TOML/JSON: {reason}")]
    Malformed { reason: String },

    #[error("policy '{policy_id}' references unknown subject label '{label}'")]
    UnknownSubjectLabel { policy_id: String, label: String },

    #[error("policy '{policy_id}' references unknown predicate label '{label}'")]
    UnknownPredicateLabel { policy_id: String, label: String },

    #[error("duplicate policy id '{policy_id}'")]
    DuplicatePolicyId { policy_id: String },

    #[error("invalid configuration field '{field}' = '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failures from the detection stage (regex compilation, extractor I/O).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("pattern for subject label '{label}' failed to compile: {reason}")]
    PatternCompile { label: String, reason: String },

    #[error("extractor oracle timed out after {elapsed_ms}ms")]
    ExtractorTimeout { elapsed_ms: u64 },

    #[error("extractor oracle returned malformed output: {reason}")]
    ExtractorMalformed { reason: String },
}

/// Failures surfaced while splicing tokenized spans back into the text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("allow-unchanged literal '{literal}' occurred {expected} times in input but {actual} in output")]
    LiteralCountMismatch {
        literal: String,
        expected: usize,
        actual: usize,
    },
}

/// Master error type. `ConfigurationError` (via `CatalogError`) is fatal to
/// process start; the remaining variants are runtime conditions the
/// orchestrator translates into a fail-closed DENY rather than propagating.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FirewallError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("evaluation was cancelled before completion")]
    Cancelled,
}

pub type FirewallResult<T> = Result<T, FirewallError>;

/// Raised to `throw_on_deny` callers instead of returning a `DENY` verdict.
/// Deliberately not part of [`FirewallError`]: a denial is the policy engine
/// working as intended, never an internal defect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FirewallDenied {
    pub denying_policy_id: PolicyId,
    pub message: &'static str,
}
