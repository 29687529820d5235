//! Policy document: the ordered rule set the Policy Engine evaluates
//! against each detection. Tagged variants throughout, per the design note
//! against a runtime-reflective matcher.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Catalog, CatalogError, PolicyId, PredicateLabel, SubjectLabel};

/// Window used to scope a predicate-to-subject binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proximity {
    Sentence,
    Paragraph,
    Document,
}

/// A cardinality constraint on the number of distinct subject surfaces
/// bound to a predicate, e.g. `>=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl Cardinality {
    pub fn is_satisfied_by(&self, count: usize) -> bool {
        match self {
            Cardinality::Exactly(k) => count == *k,
            Cardinality::AtLeast(k) => count >= *k,
            Cardinality::AtMost(k) => count <= *k,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Exactly(k) => write!(f, "=={}", k),
            Cardinality::AtLeast(k) => write!(f, ">={}", k),
            Cardinality::AtMost(k) => write!(f, "<={}", k),
        }
    }
}

/// Error parsing a cardinality expression such as `">=2"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardinalityParseError(pub String);

impl fmt::Display for CardinalityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cardinality expression: {}", self.0)
    }
}

impl std::error::Error for CardinalityParseError {}

impl FromStr for Cardinality {
    type Err = CardinalityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("==") {
            return rest
                .trim()
                .parse()
                .map(Cardinality::Exactly)
                .map_err(|_| CardinalityParseError(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix(">=") {
            return rest
                .trim()
                .parse()
                .map(Cardinality::AtLeast)
                .map_err(|_| CardinalityParseError(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return rest
                .trim()
                .parse()
                .map(Cardinality::AtMost)
                .map_err(|_| CardinalityParseError(s.to_string()));
        }
        Err(CardinalityParseError(s.to_string()))
    }
}

impl Serialize for Cardinality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A predicate-to-subject binding requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindClause {
    pub subjects: Vec<SubjectLabel>,
    pub proximity: Proximity,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

/// What a policy's `when` clause matches against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenClause {
    /// Matches any detection whose subject label is in `subjects`.
    Subjects {
        subjects: Vec<SubjectLabel>,
        #[serde(default)]
        min_confidence: Option<f32>,
    },
    /// Matches a predicate detection, requiring a successful binding.
    Predicate {
        predicate: PredicateLabel,
        #[serde(default)]
        bind: Option<BindClause>,
        #[serde(default)]
        min_confidence: Option<f32>,
    },
}

impl WhenClause {
    pub fn min_confidence(&self) -> Option<f32> {
        match self {
            WhenClause::Subjects { min_confidence, .. } => *min_confidence,
            WhenClause::Predicate { min_confidence, .. } => *min_confidence,
        }
    }
}

/// A guard that, when true for a given detection's context, suppresses the
/// policy for that detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlessGuard {
    InQuote,
    InCodeBlock,
    PublicRecord,
}

/// Which side of a predicate binding a `TOKENIZE` action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Targets {
    Subjects,
    Predicates,
    Both,
}

/// The action a matching, unguarded policy applies to a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Deny,
    Tokenize {
        #[serde(default = "default_targets")]
        targets: Targets,
    },
}

fn default_targets() -> Targets {
    Targets::Both
}

impl Action {
    /// Precedence rank: higher wins when multiple policies match the same
    /// span. DENY > TOKENIZE > ALLOW, independent of declaration order.
    pub fn precedence(&self) -> u8 {
        match self {
            Action::Deny => 2,
            Action::Tokenize { .. } => 1,
            Action::Allow => 0,
        }
    }
}

/// One rule in the policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDef {
    pub id: PolicyId,
    pub when: WhenClause,
    #[serde(default)]
    pub unless: Vec<UnlessGuard>,
    pub then: Action,
}

/// The full, declaration-ordered policy set. Order only breaks ties among
/// policies at the same precedence level for the same span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PolicySet {
    pub policies: Vec<PolicyDef>,
}

impl PolicySet {
    fn validate(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let mut seen_ids = HashSet::new();
        for policy in &self.policies {
            if !seen_ids.insert(policy.id.clone()) {
                return Err(CatalogError::DuplicatePolicyId {
                    policy_id: policy.id.to_string(),
                });
            }
            match &policy.when {
                WhenClause::Subjects { subjects, .. } => {
                    for label in subjects {
                        if catalog.subject(label).is_none() {
                            return Err(CatalogError::UnknownSubjectLabel {
                                policy_id: policy.id.to_string(),
                                label: label.to_string(),
                            });
                        }
                    }
                }
                WhenClause::Predicate { predicate, bind, .. } => {
                    if catalog.predicate(predicate).is_none() {
                        return Err(CatalogError::UnknownPredicateLabel {
                            policy_id: policy.id.to_string(),
                            label: predicate.to_string(),
                        });
                    }
                    if let Some(bind) = bind {
                        for label in &bind.subjects {
                            if catalog.subject(label).is_none() {
                                return Err(CatalogError::UnknownSubjectLabel {
                                    policy_id: policy.id.to_string(),
                                    label: label.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Loads and structurally validates a Policy document against a Catalog.
pub struct PolicyLoader;

impl PolicyLoader {
    pub fn load_yaml(source: &str, catalog: &Catalog) -> Result<PolicySet, CatalogError> {
        let policies: PolicySet =
            serde_yaml::from_str(source).map_err(|e| CatalogError::Malformed {
                reason: e.to_string(),
            })?;
        policies.validate(catalog)?;
        Ok(policies)
    }

    pub fn load_toml(source: &str, catalog: &Catalog) -> Result<PolicySet, CatalogError> {
        let policies: PolicySet = toml::from_str(source).map_err(|e| CatalogError::Malformed {
            reason: e.to_string(),
        })?;
        policies.validate(catalog)?;
        Ok(policies)
    }

    pub fn load_json(source: &str, catalog: &Catalog) -> Result<PolicySet, CatalogError> {
        let policies: PolicySet =
            serde_json::from_str(source).map_err(|e| CatalogError::Malformed {
                reason: e.to_string(),
            })?;
        policies.validate(catalog)?;
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_cardinality_expressions() {
        assert_eq!(">=2".parse(), Ok(Cardinality::AtLeast(2)));
        assert_eq!("==1".parse(), Ok(Cardinality::Exactly(1)));
        assert_eq!("<=3".parse(), Ok(Cardinality::AtMost(3)));
        assert!("2".parse::<Cardinality>().is_err());
    }

    #[test]
    fn action_precedence_orders_deny_above_tokenize_above_allow() {
        assert!(Action::Deny.precedence() > Action::Tokenize { targets: Targets::Both }.precedence());
        assert!(
            Action::Tokenize { targets: Targets::Both }.precedence() > Action::Allow.precedence()
        );
    }

    #[test]
    fn rejects_policy_referencing_unknown_label() {
        let catalog = Catalog::default();
        let source = "policies:\n  - id: pol_a\n    when:\n      type: subjects\n      subjects: [PERSON]\n    then:\n      action: ALLOW\n";
        assert!(matches!(
            PolicyLoader::load_yaml(source, &catalog),
            Err(CatalogError::UnknownSubjectLabel { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_policy_ids() {
        let catalog = Catalog {
            subjects: vec![crate::SubjectDef {
                label: SubjectLabel::new("PERSON"),
                patterns: vec![],
                description: None,
                examples: vec![],
            }],
            predicates: vec![],
        };
        let source = "policies:\n  - id: pol_a\n    when:\n      type: subjects\n      subjects: [PERSON]\n    then:\n      action: ALLOW\n  - id: pol_a\n    when:\n      type: subjects\n      subjects: [PERSON]\n    then:\n      action: DENY\n";
        assert!(matches!(
            PolicyLoader::load_yaml(source, &catalog),
            Err(CatalogError::DuplicatePolicyId { .. })
        ));
    }

    proptest! {
        /// `Display`/`FromStr` round-trip for every cardinality shape.
        #[test]
        fn cardinality_display_parse_round_trips(k in 0usize..1000) {
            for cardinality in [Cardinality::Exactly(k), Cardinality::AtLeast(k), Cardinality::AtMost(k)] {
                let rendered = cardinality.to_string();
                prop_assert_eq!(rendered.parse::<Cardinality>(), Ok(cardinality));
            }
        }
    }
}
