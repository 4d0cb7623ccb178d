//! Rule evaluator: pure functions, one per catalog rule.
//!
//! Each function takes an untrusted candidate value and either accepts it,
//! returning the value coerced to canonical form, or rejects it. Type
//! confusion (booleans where numbers are expected, nested containers where
//! scalars are expected) is a rejection, never a panic.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use super::rules::{Rejection, Rule, WhitelistCoercion};

/// Canonical base-10 integer: optional sign, no leading zeros.
static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(0|[1-9][0-9]*)$").expect("valid regex"));

/// Numeric string: integer, decimal, or exponent form.
static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").expect("valid regex")
});

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[-a-z0-9_]+$").expect("valid regex"));

/// Apply one rule to a candidate value.
pub fn apply_rule(rule: &Rule, value: &Value) -> Result<Value, Rejection> {
    match rule {
        Rule::Integer { min, max } => evaluate_integer(value, *min, *max),
        Rule::PositiveInteger { max } => evaluate_integer(value, Some(1), *max),
        Rule::Max { bound } => evaluate_max(value, *bound),
        Rule::Slug => evaluate_slug(value),
        Rule::InArray {
            whitelist,
            coercion,
        } => evaluate_in_array(value, whitelist, *coercion),
        Rule::Bool {
            invalidate_on_absence,
        } => evaluate_bool(value, *invalidate_on_absence),
        Rule::String => evaluate_string(value),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn evaluate_integer(value: &Value, min: Option<i64>, max: Option<i64>) -> Result<Value, Rejection> {
    let n = parse_integer(value).ok_or_else(|| Rejection::new("must be an integer"))?;
    if let Some(min) = min {
        if n < min {
            return Err(Rejection::new(format!("must be at least {min}")));
        }
    }
    if let Some(max) = max {
        if n > max {
            return Err(Rejection::new(format!("must be at most {max}")));
        }
    }
    Ok(Value::from(n))
}

fn evaluate_max(value: &Value, bound: f64) -> Result<Value, Rejection> {
    let numeric = parse_numeric(value).ok_or_else(|| Rejection::new("must be numeric"))?;
    let within = match numeric {
        Numeric::Int(i) => int_within(i, bound),
        Numeric::Float(f) => f <= bound,
    };
    if !within {
        return Err(Rejection::new(format!("must not exceed {bound}")));
    }
    numeric
        .into_value()
        .ok_or_else(|| Rejection::new("must be a finite number"))
}

/// Whole bounds inside the i64 range compare exactly; `i as f64` rounds
/// above 2^53.
fn int_within(i: i64, bound: f64) -> bool {
    if bound.fract() == 0.0 && bound >= i64::MIN as f64 && bound < i64::MAX as f64 {
        i <= bound as i64
    } else {
        (i as f64) <= bound
    }
}

fn evaluate_slug(value: &Value) -> Result<Value, Rejection> {
    if value.is_boolean() {
        return Err(Rejection::new("must be a slug"));
    }
    match scalar_text(value) {
        Some(text) if SLUG_RE.is_match(&text) => Ok(Value::String(text)),
        _ => Err(Rejection::new("must be a slug")),
    }
}

fn evaluate_in_array(
    value: &Value,
    whitelist: &[Value],
    coercion: WhitelistCoercion,
) -> Result<Value, Rejection> {
    let candidate = match coercion {
        WhitelistCoercion::GuessFromWhitelist if whitelist.first().is_some_and(is_integer) => {
            parse_integer(value)
                .map(Value::from)
                .ok_or_else(|| Rejection::new("must be one of the allowed values"))?
        }
        _ => value.clone(),
    };
    if whitelist.contains(&candidate) {
        Ok(candidate)
    } else {
        Err(Rejection::new("must be one of the allowed values"))
    }
}

fn evaluate_bool(value: &Value, invalidate_on_absence: bool) -> Result<Value, Rejection> {
    if value.is_null() {
        return if invalidate_on_absence {
            Err(Rejection::new("must be present"))
        } else {
            Ok(Value::Bool(false))
        };
    }
    match parse_bool(value) {
        Some(b) => Ok(Value::Bool(b)),
        None if invalidate_on_absence => Err(Rejection::new("must be a boolean")),
        None => Ok(Value::Bool(false)),
    }
}

fn evaluate_string(value: &Value) -> Result<Value, Rejection> {
    scalar_text(value)
        .map(Value::String)
        .ok_or_else(|| Rejection::new("must be a scalar"))
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn into_value(self) -> Option<Value> {
        match self {
            Numeric::Int(i) => Some(Value::from(i)),
            Numeric::Float(f) => Number::from_f64(f).map(Value::Number),
        }
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

/// Integer form of a number or canonical integer string. Floats count when
/// they carry no fractional part.
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            if INTEGER_RE.is_match(s) {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Numeric::Int(i)),
            None => n.as_f64().map(Numeric::Float),
        },
        Value::String(s) => {
            let s = s.trim();
            if !NUMERIC_RE.is_match(s) {
                return None;
            }
            let digits = s.trim_start_matches(['+', '-']);
            if digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(i) = s.parse::<i64>() {
                    return Some(Numeric::Int(i));
                }
            }
            s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Numeric::Float)
        }
        _ => None,
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    let text = match value {
        Value::Bool(b) => return Some(*b),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.trim().to_ascii_lowercase(),
        _ => return None,
    };
    match text.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Textual form of a scalar. `true` renders as `"1"`, `false` as `""`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Whole floats below 1e15 render without a fractional part.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}
