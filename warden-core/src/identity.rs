//! Identity types.
//!
//! `SpanId`/`DetectionId` are request-local arena indices: there is no
//! cross-request identity to preserve, so unlike most identifiers in this
//! family they are not UUIDs (see the arena note in the orchestrator).
//! `PolicyId` and the catalog label types are interned strings because they
//! originate from user-authored configuration rather than being generated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! define_index_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Construct an id from a raw arena index.
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// The arena index this id addresses.
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_index_id!(SpanId, "Arena index of a resolved span within one request.");
define_index_id!(
    DetectionId,
    "Arena index of a detection (span plus binding state) within one request."
);

macro_rules! define_label_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a caller-supplied label string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying label text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }
    };
}

define_label_id!(PolicyId, "Opaque identifier of a policy, as declared in the policy document.");
define_label_id!(SubjectLabel, "Catalog label for a subject kind, e.g. `PERSON` or `EMAIL`.");
define_label_id!(PredicateLabel, "Catalog label for a predicate kind, e.g. `FINANCIAL_EVENT`.");

/// Process-wide identifier of one firewall evaluation, used only for audit
/// correlation. Generated per request, never persisted with the request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Wrap a caller-supplied or previously generated request id.
    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
