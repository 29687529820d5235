//! The Orchestrator: wires the Normalizer, Detector, Span Resolver,
//! Binder, Policy Engine, Tokenizer and Rewriter into one request-facing
//! `Firewall` handle.

mod cancellation;
mod orchestrator;

pub use cancellation::*;
pub use orchestrator::*;
