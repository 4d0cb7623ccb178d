//! Declarative validation and sanitization of untyped request data.
//!
//! Callers declare per-field expectations on an [`Expector`] through a fluent
//! API; the engine validates the raw input against them on first read and
//! yields a cleaned output mapping plus an overall validity verdict.

pub mod assumption;
pub mod config;
pub mod error;
pub mod expector;
pub mod flags;
pub mod sanitize;
pub mod types;
pub mod validation;

pub use assumption::{Assumption, Constraint};
pub use config::ExpectorConfig;
pub use error::ExpectError;
pub use expector::Expector;
pub use flags::Flags;
pub use types::{FieldSet, Payload};
pub use validation::rules::{FieldViolation, Rule, RuleKind, WhitelistCoercion};
