//! The per-request outcome assembled by the Orchestrator.

use serde::{Deserialize, Serialize};

use crate::{PolicyId, Span, SpanId};

/// A resolved span plus, for predicates, the subjects the Binder attached
/// to it and the token id the Tokenizer assigned if it was rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: SpanId,
    pub span: Span,
    #[serde(default)]
    pub bound_subjects: Vec<SpanId>,
    #[serde(default)]
    pub token_id: Option<String>,
}

/// The overall action computed for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictAction {
    Allow,
    Deny,
    Tokenize,
}

/// The result of one Orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub action: VerdictAction,
    #[serde(default)]
    pub denying_policy_id: Option<PolicyId>,
    /// `None` when `action == Deny`; the rewritten (or unchanged) text
    /// otherwise.
    #[serde(default)]
    pub output_text: Option<String>,
    pub detections: Vec<Detection>,
    pub applied_policy_ids: Vec<PolicyId>,
}

impl Verdict {
    pub fn deny(denying_policy_id: PolicyId, detections: Vec<Detection>) -> Self {
        Self {
            action: VerdictAction::Deny,
            denying_policy_id: Some(denying_policy_id.clone()),
            output_text: None,
            detections,
            applied_policy_ids: vec![denying_policy_id],
        }
    }

    pub fn allow(output_text: String, detections: Vec<Detection>) -> Self {
        Self {
            action: VerdictAction::Allow,
            denying_policy_id: None,
            output_text: Some(output_text),
            detections,
            applied_policy_ids: Vec::new(),
        }
    }

    pub fn tokenize(
        output_text: String,
        detections: Vec<Detection>,
        applied_policy_ids: Vec<PolicyId>,
    ) -> Self {
        Self {
            action: VerdictAction::Tokenize,
            denying_policy_id: None,
            output_text: Some(output_text),
            detections,
            applied_policy_ids,
        }
    }

    /// A compact record suitable for audit logging: counts and ids only,
    /// never surfaces or output text.
    pub fn audit_summary(&self) -> AuditSummary {
        AuditSummary {
            action: self.action,
            applied_policy_ids: self.applied_policy_ids.clone(),
            detection_count: self.detections.len(),
        }
    }
}

/// What gets logged for a completed request. See the configuration surface
/// note on persisted state: never the original text, never a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub action: VerdictAction,
    pub applied_policy_ids: Vec<PolicyId>,
    pub detection_count: usize,
}
