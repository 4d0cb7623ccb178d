//! Assumptions: rule templates applied to every matching key of the input.
//!
//! An assumption names a rule (optionally with parameters) and a set of field
//! names. Every object key anywhere in the input, at any nesting depth, that
//! matches one of those names receives the rule as an expectation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExpectError;
use crate::types::{FieldSet, Payload};
use crate::validation::conflict::merge_expectation;
use crate::validation::rules::{Expectation, Registry, Rule, RuleKind, WhitelistCoercion};

/// Rule part of an assumption: a bare rule name, or `[name, params...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Rule(String),
    WithParams(Vec<Value>),
}

impl Constraint {
    /// Split into rule name and positional parameters.
    pub fn parts(&self) -> Result<(&str, &[Value]), ExpectError> {
        match self {
            Self::Rule(name) => Ok((name.as_str(), [].as_slice())),
            Self::WithParams(items) => match items.split_first() {
                Some((Value::String(name), params)) => Ok((name.as_str(), params)),
                _ => Err(ExpectError::InvalidInput(
                    "constraint list must start with a rule name".to_string(),
                )),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub constraint: Constraint,
    pub fields: Vec<String>,
}

impl Assumption {
    /// Assume a parameterless rule for `fields`.
    pub fn new(rule: impl Into<String>, fields: impl FieldSet) -> Self {
        Self {
            constraint: Constraint::Rule(rule.into()),
            fields: fields.into_fields(),
        }
    }

    /// Assume a rule with positional parameters for `fields`.
    pub fn with_params(rule: impl Into<String>, params: Vec<Value>, fields: impl FieldSet) -> Self {
        let mut items = Vec::with_capacity(params.len() + 1);
        items.push(Value::String(rule.into()));
        items.extend(params);
        Self {
            constraint: Constraint::WithParams(items),
            fields: fields.into_fields(),
        }
    }
}

/// Scan `input` depth-first and synthesize one declaration per matching key.
///
/// Every constraint is resolved against the rule registry up front, so an
/// unknown rule fails even when no key matches. When several assumptions
/// name the same field, the last one wins. Array indices are not keys.
/// `next_index` supplies declaration indices and is advanced per
/// declaration.
pub fn derive_expectations(
    input: &Payload,
    assumptions: &[Assumption],
    coercion: WhitelistCoercion,
    next_index: &mut usize,
) -> Result<Registry, ExpectError> {
    let mut templates: HashMap<&str, (Rule, Option<Value>)> = HashMap::new();
    for assumption in assumptions {
        let (name, params) = assumption.constraint.parts()?;
        let kind: RuleKind = name.parse()?;
        let template = kind.declare(params, coercion)?;
        for field in &assumption.fields {
            templates.insert(field.as_str(), template.clone());
        }
    }

    let mut registry = Registry::new();
    if templates.is_empty() {
        return Ok(registry);
    }

    walk_keys(input, &mut |key| {
        if let Some((rule, default)) = templates.get(key) {
            let expectation = Expectation::new(rule.clone(), default.clone(), *next_index);
            *next_index += 1;
            merge_expectation(registry.entry(key.to_string()).or_default(), expectation);
        }
    });

    tracing::debug!(
        assumptions = assumptions.len(),
        fields = registry.len(),
        "Derived expectations from assumptions"
    );

    Ok(registry)
}

/// Visit every object key, parents before their children.
fn walk_keys(map: &Payload, visit: &mut impl FnMut(&str)) {
    for (key, value) in map {
        visit(key);
        walk_value(value, visit);
    }
}

fn walk_value(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::Object(map) => walk_keys(map, visit),
        Value::Array(items) => {
            for item in items {
                walk_value(item, visit);
            }
        }
        _ => {}
    }
}
