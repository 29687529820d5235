//! The Detector and Span Resolver.
//!
//! Two detection sources feed the same candidate span shape
//! (`warden_core::Span`): the regex path in this crate, and an external
//! Extractor oracle reached through the [`Extractor`] trait. The Span
//! Resolver then merges, filters and deduplicates whatever either source
//! produced.

mod oracle;
mod regex_detect;
mod resolve;

pub use oracle::*;
pub use regex_detect::*;
pub use resolve::*;
