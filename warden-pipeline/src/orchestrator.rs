//! The Orchestrator: drives the Normalizer, Detector, Span Resolver,
//! Binder, Policy Engine, Tokenizer and Rewriter in order for one request
//! and assembles the Verdict.

use std::sync::Arc;

use uuid::Uuid;

use warden_core::{
    Catalog, Detection, DetectError, FirewallConfig, FirewallDenied, FirewallError, FirewallResult,
    PolicyId, PolicySet, RequestId, Span, SpanId, SpanKind, SpanLabel, TokenFormat, Verdict,
};
use warden_detect::{build_prompt, relocate_oracle_candidates, resolve, Extractor, RegexDetector};
use warden_normalize::{normalize, segment, Paragraph, Sentence};
use warden_policy::{evaluate as evaluate_policies, Outcome};
use warden_rewrite::{collect_preserved_literals, rewrite, ReplacementSpan};
use warden_tokenize::{render_placeholder, Tokenizer};

use crate::CancellationToken;

/// One request to the Orchestrator. Catalog and Policy set are ambient,
/// carried by the `Firewall` handle rather than the request.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub text: String,
    pub token_format: Option<TokenFormat>,
    pub preserve_literals: Vec<String>,
}

impl EvaluationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), token_format: None, preserve_literals: Vec::new() }
    }
}

/// Failure surfaced to a `throw_on_deny` caller, distinguishing an internal
/// defect from the expected "this request was denied" outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Internal(#[from] FirewallError),
    #[error(transparent)]
    Denied(#[from] FirewallDenied),
}

pub type EvaluationResult = Result<Verdict, EvaluationError>;

fn is_preserved_label(span: &Span) -> bool {
    matches!(&span.label, SpanLabel::Subject(l) if l.as_str() == "MONEY" || l.as_str() == "DATE")
}

/// A process-wide handle over one loaded Catalog, Policy set and
/// configuration. Cheap to clone: the heavy state lives behind `Arc`, the
/// same sharing pattern the rest of this family uses for process-wide
/// config.
#[derive(Clone)]
pub struct Firewall {
    catalog: Arc<Catalog>,
    policies: Arc<PolicySet>,
    config: Arc<FirewallConfig>,
    detector: Arc<RegexDetector>,
    tokenizer: Tokenizer,
}

impl Firewall {
    pub fn new(catalog: Catalog, policies: PolicySet, config: FirewallConfig) -> FirewallResult<Self> {
        config.validate()?;
        let catalog = catalog.with_builtin_subjects();
        let detector = RegexDetector::new(&catalog)?;
        let tokenizer = Tokenizer::with_mask_aware_tokenization(
            &config.secret_key,
            config.token_format,
            config.mask_aware_tokenization,
        );
        Ok(Self {
            catalog: Arc::new(catalog),
            policies: Arc::new(policies),
            config: Arc::new(config),
            detector: Arc::new(detector),
            tokenizer,
        })
    }

    /// Runs one evaluation end to end. Returns a `Verdict` for every
    /// outcome unless `throw_on_deny` is set in the configuration, in
    /// which case a DENY is raised as [`EvaluationError::Denied`] instead.
    pub fn evaluate(
        &self,
        request: EvaluationRequest,
        extractor: &dyn Extractor,
        cancellation: &CancellationToken,
    ) -> EvaluationResult {
        let request_id = RequestId::from_uuid(Uuid::now_v7());
        let span = tracing::debug_span!("firewall_evaluate", request_id = %request_id);
        let _enter = span.enter();
        self.evaluate_inner(request, extractor, cancellation, request_id)
    }

    fn evaluate_inner(
        &self,
        request: EvaluationRequest,
        extractor: &dyn Extractor,
        cancellation: &CancellationToken,
        request_id: RequestId,
    ) -> EvaluationResult {
        if cancellation.is_cancelled() {
            return self.finish_deny(PolicyId::new("cancelled"), request_id, Vec::new());
        }

        let normalized = self.normalize_stage(&request.text);
        let (paragraphs, sentences) = self.segment_stage(&normalized.normalized);

        let mut spans = self.detect_regex_stage(&normalized.normalized);

        if cancellation.is_cancelled() {
            return self.finish_deny(PolicyId::new("cancelled"), request_id, Vec::new());
        }

        match self.detect_oracle_stage(&normalized.normalized, extractor) {
            Ok(oracle_spans) => spans.extend(oracle_spans),
            Err(DetectError::ExtractorTimeout { .. }) => {
                return self.finish_deny(PolicyId::new("extractor_timeout"), request_id, Vec::new());
            }
            Err(DetectError::ExtractorMalformed { .. }) => {
                return self.finish_deny(PolicyId::new("extractor_malformed"), request_id, Vec::new());
            }
            Err(other) => return Err(EvaluationError::Internal(FirewallError::from(other))),
        }

        let spans = self.resolve_stage(spans, &normalized.normalized);

        let outcome = self.policy_stage(&spans, &normalized.normalized, &paragraphs, &sentences);

        let (decisions, applied_policy_ids) = match outcome {
            Outcome::Deny { policy_id } => {
                let detections = spans
                    .iter()
                    .enumerate()
                    .map(|(idx, span)| Detection {
                        id: SpanId::from_index(idx),
                        span: span.clone(),
                        bound_subjects: Vec::new(),
                        token_id: None,
                    })
                    .collect();
                return self.finish_deny(policy_id, request_id, detections);
            }
            Outcome::Resolved { decisions, applied_policy_ids } => (decisions, applied_policy_ids),
        };

        if cancellation.is_cancelled() {
            return self.finish_deny(PolicyId::new("cancelled"), request_id, Vec::new());
        }

        let format = request.token_format.unwrap_or_else(|| self.tokenizer.format());
        let (detections, replacement_spans) = self.tokenize_stage(&spans, &decisions, format);

        let money_and_date_spans: Vec<Span> = spans.iter().filter(|s| is_preserved_label(s)).cloned().collect();
        let preserved_literals =
            collect_preserved_literals(&normalized.normalized, &money_and_date_spans, &request.preserve_literals);

        match self.rewrite_stage(&normalized.normalized, &replacement_spans, &preserved_literals) {
            Ok(output_text) => {
                let verdict = if replacement_spans.is_empty() {
                    Verdict::allow(output_text, detections)
                } else {
                    Verdict::tokenize(output_text, detections, applied_policy_ids)
                };
                self.finish_resolved(request_id, verdict)
            }
            Err(_rewrite_error) => self.finish_deny(PolicyId::new("rewrite_violation"), request_id, detections),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, text))]
    fn normalize_stage(&self, text: &str) -> warden_normalize::NormalizedText {
        let normalized = normalize(text);
        tracing::debug!(char_count = normalized.char_count(), "normalization complete");
        normalized
    }

    #[tracing::instrument(level = "debug", skip(self, normalized))]
    fn segment_stage(&self, normalized: &str) -> (Vec<Paragraph>, Vec<Sentence>) {
        let (paragraphs, sentences) = segment(normalized);
        tracing::debug!(
            paragraph_count = paragraphs.len(),
            sentence_count = sentences.len(),
            "segmentation complete"
        );
        (paragraphs, sentences)
    }

    #[tracing::instrument(level = "debug", skip(self, normalized))]
    fn detect_regex_stage(&self, normalized: &str) -> Vec<Span> {
        let spans = self.detector.detect(normalized);
        tracing::debug!(span_count = spans.len(), "regex detection complete");
        spans
    }

    #[tracing::instrument(level = "debug", skip(self, normalized, extractor))]
    fn detect_oracle_stage(
        &self,
        normalized: &str,
        extractor: &dyn Extractor,
    ) -> Result<Vec<Span>, DetectError> {
        let prompt = build_prompt(&self.catalog);
        let candidates = extractor.extract(normalized, &prompt, self.config.extractor_timeout())?;
        let spans = relocate_oracle_candidates(normalized, candidates);
        tracing::debug!(span_count = spans.len(), "oracle detection complete");
        Ok(spans)
    }

    #[tracing::instrument(level = "debug", skip(self, spans, normalized))]
    fn resolve_stage(&self, spans: Vec<Span>, normalized: &str) -> Vec<Span> {
        let resolved = resolve(spans, normalized, &self.policies, self.config.default_confidence_threshold);
        tracing::debug!(span_count = resolved.len(), "span resolution complete");
        resolved
    }

    #[tracing::instrument(level = "debug", skip(self, spans, normalized, paragraphs, sentences))]
    fn policy_stage(
        &self,
        spans: &[Span],
        normalized: &str,
        paragraphs: &[Paragraph],
        sentences: &[Sentence],
    ) -> Outcome {
        evaluate_policies(
            spans,
            normalized,
            &self.policies,
            self.config.default_confidence_threshold,
            paragraphs,
            sentences,
            &self.config.public_record_markers,
        )
    }

    #[tracing::instrument(level = "debug", skip(self, spans, decisions))]
    fn tokenize_stage(
        &self,
        spans: &[Span],
        decisions: &[warden_policy::SpanDecision],
        format: TokenFormat,
    ) -> (Vec<Detection>, Vec<ReplacementSpan>) {
        let mut session = self.tokenizer.session();
        let mut detections = Vec::with_capacity(spans.len());
        let mut replacement_spans = Vec::new();

        for (idx, span) in spans.iter().enumerate() {
            let decision = &decisions[idx];
            let bound_subjects = decision.bound_span_indices.iter().map(|&i| SpanId::from_index(i)).collect();

            let token_id = if decision.tokenize {
                let id = session.token_id(span.kind, span.label.as_str(), span.canonical_surface());
                replacement_spans.push(ReplacementSpan {
                    start: span.start,
                    end: span.end,
                    placeholder: render_placeholder(span.kind, span.label.as_str(), &id, format),
                });
                Some(id)
            } else {
                None
            };

            detections.push(Detection { id: SpanId::from_index(idx), span: span.clone(), bound_subjects, token_id });
        }

        tracing::debug!(tokenized_count = replacement_spans.len(), "tokenization complete");
        (detections, replacement_spans)
    }

    #[tracing::instrument(level = "debug", skip(self, normalized, spans, preserved_literals))]
    fn rewrite_stage(
        &self,
        normalized: &str,
        spans: &[ReplacementSpan],
        preserved_literals: &[String],
    ) -> Result<String, warden_core::RewriteError> {
        let output = rewrite(normalized, spans, preserved_literals)?;
        tracing::debug!(replaced_span_count = spans.len(), "rewrite complete");
        Ok(output)
    }

    fn finish_deny(&self, policy_id: PolicyId, request_id: RequestId, detections: Vec<Detection>) -> EvaluationResult {
        let verdict = Verdict::deny(policy_id.clone(), detections);
        self.emit_audit(request_id, &verdict);
        if self.config.throw_on_deny {
            Err(EvaluationError::Denied(FirewallDenied {
                denying_policy_id: policy_id,
                message: "content policy violation",
            }))
        } else {
            Ok(verdict)
        }
    }

    fn finish_resolved(&self, request_id: RequestId, verdict: Verdict) -> EvaluationResult {
        self.emit_audit(request_id, &verdict);
        Ok(verdict)
    }

    /// Emits the one audit event per request: counts and ids only, never
    /// the request text or any detection surface.
    fn emit_audit(&self, request_id: RequestId, verdict: &Verdict) {
        let summary = verdict.audit_summary();
        tracing::info!(
            request_id = %request_id,
            action = ?summary.action,
            applied_policy_ids = ?summary.applied_policy_ids,
            detection_count = summary.detection_count,
            "firewall evaluation complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::SecretString;
    use warden_core::{Action, PolicyDef, SubjectDef, SubjectLabel, WhenClause};
    use warden_detect::NullExtractor;

    fn firewall() -> Firewall {
        let catalog = Catalog {
            subjects: vec![SubjectDef {
                label: SubjectLabel::new("EMAIL"),
                patterns: vec![r"[\w.+-]+@[\w-]+\.[\w.-]+".to_string()],
                description: None,
                examples: vec![],
            }],
            predicates: vec![],
        };
        let policies = PolicySet {
            policies: vec![PolicyDef {
                id: "tok_email".into(),
                when: WhenClause::Subjects { subjects: vec![SubjectLabel::new("EMAIL")], min_confidence: None },
                unless: vec![],
                then: Action::Tokenize { targets: warden_core::Targets::Both },
            }],
        };
        let config = FirewallConfig {
            secret_key: SecretString::from("test-secret-key".to_string()),
            default_confidence_threshold: 0.5,
            throw_on_deny: false,
            token_format: TokenFormat::Bracket,
            extractor_timeout_ms: 1000,
            mask_aware_tokenization: false,
            public_record_markers: Vec::new(),
        };
        Firewall::new(catalog, policies, config).unwrap()
    }

    #[test]
    fn tokenizes_matched_email_and_preserves_rest_of_text() {
        let fw = firewall();
        let request = EvaluationRequest::new("contact alice@example.com for details");
        let verdict = fw.evaluate(request, &NullExtractor, &CancellationToken::new());
        let verdict = verdict.unwrap();
        assert_eq!(verdict.action, warden_core::VerdictAction::Tokenize);
        let output = verdict.output_text.unwrap();
        assert!(output.contains("[[SUBJ:EMAIL:"));
        assert!(output.contains("for details"));
    }

    #[test]
    fn allows_text_with_no_detections() {
        let fw = firewall();
        let request = EvaluationRequest::new("nothing sensitive here");
        let verdict = fw.evaluate(request, &NullExtractor, &CancellationToken::new()).unwrap();
        assert_eq!(verdict.action, warden_core::VerdictAction::Allow);
        assert_eq!(verdict.output_text.unwrap(), "nothing sensitive here");
    }

    #[test]
    fn cancellation_before_evaluation_denies_with_cancelled_id() {
        let fw = firewall();
        let token = CancellationToken::new();
        token.cancel();
        let request = EvaluationRequest::new("alice@example.com");
        let verdict = fw.evaluate(request, &NullExtractor, &token).unwrap();
        assert_eq!(verdict.action, warden_core::VerdictAction::Deny);
        assert_eq!(verdict.denying_policy_id, Some(PolicyId::new("cancelled")));
    }

    #[test]
    fn throw_on_deny_raises_instead_of_returning_verdict() {
        let catalog = Catalog {
            subjects: vec![SubjectDef {
                label: SubjectLabel::new("SSN"),
                patterns: vec![r"\d{3}-\d{2}-\d{4}".to_string()],
                description: None,
                examples: vec![],
            }],
            predicates: vec![],
        };
        let policies = PolicySet {
            policies: vec![PolicyDef {
                id: "deny_ssn".into(),
                when: WhenClause::Subjects { subjects: vec![SubjectLabel::new("SSN")], min_confidence: None },
                unless: vec![],
                then: Action::Deny,
            }],
        };
        let config = FirewallConfig {
            secret_key: SecretString::from("test-secret-key".to_string()),
            default_confidence_threshold: 0.5,
            throw_on_deny: true,
            token_format: TokenFormat::Bracket,
            extractor_timeout_ms: 1000,
            mask_aware_tokenization: false,
            public_record_markers: Vec::new(),
        };
        let fw = Firewall::new(catalog, policies, config).unwrap();
        let request = EvaluationRequest::new("SSN is 123-45-6789");
        let err = fw.evaluate(request, &NullExtractor, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, EvaluationError::Denied(FirewallDenied { .. })));
    }

    proptest! {
        /// Invariant 1 (determinism): evaluating the same text under the
        /// same firewall twice produces the same verdict, including the
        /// tokenizer's opaque ids (a fresh `TokenSession` per request
        /// doesn't change the id, since the key and canonical surface are
        /// the same both times).
        #[test]
        fn evaluating_same_text_twice_yields_identical_verdicts(
            local_part in "[a-z]{3,10}",
            domain in "[a-z]{3,10}",
        ) {
            let fw = firewall();
            let text = format!("contact {local_part}@{domain}.com today");
            let v1 = fw
                .evaluate(EvaluationRequest::new(text.clone()), &NullExtractor, &CancellationToken::new())
                .unwrap();
            let v2 = fw
                .evaluate(EvaluationRequest::new(text), &NullExtractor, &CancellationToken::new())
                .unwrap();
            prop_assert_eq!(v1.output_text, v2.output_text);
        }
    }
}
