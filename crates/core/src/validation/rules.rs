//! Rule catalog, rule-name registry, and failure records.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExpectError;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name of a rule in the catalog, independent of its parameters.
///
/// Two declarations conflict when they carry the same `RuleKind` on the same
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Integer,
    PositiveInteger,
    Max,
    Slug,
    InArray,
    Bool,
    String,
}

impl RuleKind {
    /// Every rule in the catalog.
    pub const ALL: [RuleKind; 7] = [
        RuleKind::Integer,
        RuleKind::PositiveInteger,
        RuleKind::Max,
        RuleKind::Slug,
        RuleKind::InArray,
        RuleKind::Bool,
        RuleKind::String,
    ];

    /// Canonical rule name, matching serde's `rename_all = "snake_case"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::PositiveInteger => "positive_integer",
            Self::Max => "max",
            Self::Slug => "slug",
            Self::InArray => "in_array",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }

    /// Short and legacy names resolving to this rule.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Integer => &["dec", "decimal"],
            Self::PositiveInteger => &["decp", "positive_decimal"],
            Self::InArray => &["inarr"],
            Self::Max | Self::Slug | Self::Bool | Self::String => &[],
        }
    }

    /// Number of rule parameters the rule takes, not counting the value
    /// itself or a trailing default.
    pub fn arity(&self) -> usize {
        match self {
            Self::Integer => 2,
            Self::PositiveInteger | Self::Max | Self::InArray | Self::Bool => 1,
            Self::Slug | Self::String => 0,
        }
    }

    /// Resolve a canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.aliases().contains(&name))
    }

    /// Build a typed rule and optional failure default from positional
    /// parameters.
    ///
    /// The first [`arity`](Self::arity) parameters are the rule's own; one
    /// extra trailing parameter is taken as the failure default. Anything
    /// beyond that is rejected.
    pub fn declare(
        self,
        params: &[Value],
        coercion: WhitelistCoercion,
    ) -> Result<(Rule, Option<Value>), ExpectError> {
        let arity = self.arity();
        if params.len() > arity + 1 {
            return Err(ExpectError::invalid_parameters(
                self.as_str(),
                format!(
                    "expected at most {} parameters (including default), got {}",
                    arity + 1,
                    params.len()
                ),
            ));
        }
        let (rule_params, rest) = params.split_at(params.len().min(arity));
        let rule = self.build(rule_params, coercion)?;
        Ok((rule, rest.first().cloned()))
    }

    fn build(self, params: &[Value], coercion: WhitelistCoercion) -> Result<Rule, ExpectError> {
        let name = self.as_str();
        let rule = match self {
            Self::Integer => Rule::Integer {
                min: optional_int(name, params.first())?,
                max: optional_int(name, params.get(1))?,
            },
            Self::PositiveInteger => Rule::PositiveInteger {
                max: optional_int(name, params.first())?,
            },
            Self::Max => {
                let bound = params
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ExpectError::invalid_parameters(name, "requires a numeric bound"))?;
                Rule::Max { bound }
            }
            Self::Slug => Rule::Slug,
            Self::InArray => {
                let whitelist = match params.first() {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items.clone(),
                    Some(other) => {
                        return Err(ExpectError::invalid_parameters(
                            name,
                            format!("whitelist must be an array, got {other}"),
                        ))
                    }
                };
                Rule::InArray {
                    whitelist,
                    coercion,
                }
            }
            Self::Bool => {
                let invalidate_on_absence = match params.first() {
                    None | Some(Value::Null) => true,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => {
                        return Err(ExpectError::invalid_parameters(
                            name,
                            format!("invalidate_on_absence must be a boolean, got {other}"),
                        ))
                    }
                };
                Rule::Bool {
                    invalidate_on_absence,
                }
            }
            Self::String => Rule::String,
        };
        Ok(rule)
    }
}

impl FromStr for RuleKind {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ExpectError::UnknownRule(s.to_string()))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn optional_int(rule: &str, param: Option<&Value>) -> Result<Option<i64>, ExpectError> {
    match param {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            ExpectError::invalid_parameters(rule, format!("bound must be an integer, got {v}"))
        }),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// How `in_array` treats a candidate before the strict comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistCoercion {
    /// Type and value must match exactly: `"90"` is not `90`.
    #[default]
    Strict,
    /// When the whitelist starts with an integer, the candidate is first
    /// coerced through the `integer` rule.
    #[serde(alias = "guess")]
    GuessFromWhitelist,
}

impl FromStr for WhitelistCoercion {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "guess" | "guess_from_whitelist" => Ok(Self::GuessFromWhitelist),
            other => Err(ExpectError::Config(format!(
                "Unknown whitelist coercion '{other}'. Valid values: strict, guess"
            ))),
        }
    }
}

/// A catalog rule together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    Integer { min: Option<i64>, max: Option<i64> },
    PositiveInteger { max: Option<i64> },
    Max { bound: f64 },
    Slug,
    InArray {
        whitelist: Vec<Value>,
        coercion: WhitelistCoercion,
    },
    Bool { invalidate_on_absence: bool },
    String,
}

impl Rule {
    pub fn integer(min: Option<i64>, max: Option<i64>) -> Self {
        Self::Integer { min, max }
    }

    pub fn positive_integer(max: Option<i64>) -> Self {
        Self::PositiveInteger { max }
    }

    pub fn max(bound: impl Into<f64>) -> Self {
        Self::Max {
            bound: bound.into(),
        }
    }

    pub fn slug() -> Self {
        Self::Slug
    }

    /// Whitelist rule with strict comparison.
    pub fn in_array<I, V>(whitelist: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::InArray {
            whitelist: whitelist.into_iter().map(Into::into).collect(),
            coercion: WhitelistCoercion::Strict,
        }
    }

    pub fn bool(invalidate_on_absence: bool) -> Self {
        Self::Bool {
            invalidate_on_absence,
        }
    }

    pub fn string() -> Self {
        Self::String
    }

    /// Override the whitelist coercion of an `in_array` rule. Other rules are
    /// returned unchanged.
    pub fn with_coercion(self, coercion: WhitelistCoercion) -> Self {
        match self {
            Self::InArray { whitelist, .. } => Self::InArray {
                whitelist,
                coercion,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Integer { .. } => RuleKind::Integer,
            Self::PositiveInteger { .. } => RuleKind::PositiveInteger,
            Self::Max { .. } => RuleKind::Max,
            Self::Slug => RuleKind::Slug,
            Self::InArray { .. } => RuleKind::InArray,
            Self::Bool { .. } => RuleKind::Bool,
            Self::String => RuleKind::String,
        }
    }

    /// Output for a rejected value when no default was declared.
    pub fn failure_value(&self) -> Value {
        match self {
            Self::Bool { .. } => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// An absent field is run through this rule as `null` instead of being
    /// reported missing.
    pub fn accepts_absence(&self) -> bool {
        matches!(
            self,
            Self::Bool {
                invalidate_on_absence: false
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Expectations
// ---------------------------------------------------------------------------

/// One declared rule on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub rule: Rule,
    /// Output value used when this rule rejects the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Declaration sequence number. Fields declared in one call share it.
    pub index: usize,
}

impl Expectation {
    pub fn new(rule: Rule, default: Option<Value>, index: usize) -> Self {
        Self {
            rule,
            default,
            index,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.rule.kind()
    }

    /// Declared default, else the rule's own failure value.
    pub fn failure_output(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.rule.failure_value())
    }
}

/// Field name to ordered rule list, in first-declaration order.
pub type Registry = IndexMap<String, Vec<Expectation>>;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a rule rejected a candidate value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single field-level failure recorded during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Rule type reported for a required field missing from the input.
pub const RULE_REQUIRED: &str = "required";
