//! Field validation rules.
//!
//! Provides the rule catalog and registry, a pure-logic evaluator, and the
//! conflict policy for repeated declarations.

pub mod conflict;
pub mod evaluator;
pub mod rules;
