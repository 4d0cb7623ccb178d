//! The expectation engine.
//!
//! An [`Expector`] owns sanitized request data and accumulates per-field
//! expectations through a fluent declaration API. Results are computed
//! lazily: any read while declarations have changed since the last pass
//! triggers a full re-evaluation, and later reads are served from the cache
//! until the next declaration.
//!
//! ```
//! use serde_json::json;
//! use sieve_core::{Expector, ExpectorConfig};
//!
//! let mut ex = Expector::from_value(json!({"page": "4", "sort": "name"}), ExpectorConfig::default())?;
//! ex.decp("page").slug("sort").decp("limit").optional("limit", 15)?;
//!
//! assert!(ex.valid());
//! assert_eq!(ex.get("page", 1)?, json!(4));
//! assert_eq!(ex.get("limit", 10)?, json!(15));
//! # Ok::<(), sieve_core::ExpectError>(())
//! ```

use indexmap::IndexMap;
use serde_json::Value;

use crate::assumption::{derive_expectations, Assumption};
use crate::config::ExpectorConfig;
use crate::error::ExpectError;
use crate::flags::Flags;
use crate::sanitize;
use crate::types::{FieldSet, Payload};
use crate::validation::conflict::{layer_registries, merge_expectation, ConflictResolution};
use crate::validation::evaluator::apply_rule;
use crate::validation::rules::{
    Expectation, FieldViolation, Registry, Rule, RuleKind, RULE_REQUIRED,
};

/// Cached result of one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
struct Evaluation {
    output: Payload,
    valid: bool,
    violations: Vec<FieldViolation>,
}

/// Declarative validator for one piece of untyped request data.
///
/// Confine an instance to a single request; it is not meant to be shared.
#[derive(Debug, Clone)]
pub struct Expector {
    input: Payload,
    config: ExpectorConfig,
    /// Expectations synthesized from assumptions, layered beneath `declared`.
    assumed: Registry,
    declared: Registry,
    optional_fields: IndexMap<String, Value>,
    next_index: usize,
    /// `None` while dirty.
    evaluation: Option<Evaluation>,
}

impl Expector {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Take ownership of `input` and trim every string in it.
    pub fn new(input: Payload, config: ExpectorConfig) -> Self {
        let mut input = input;
        sanitize::trim_strings(&mut input);
        Self {
            input,
            config,
            assumed: Registry::new(),
            declared: Registry::new(),
            optional_fields: IndexMap::new(),
            next_index: 0,
            evaluation: None,
        }
    }

    /// Like [`new`](Self::new), then apply `assumptions` to every matching key
    /// of the input.
    ///
    /// Fails on assumptions naming an unknown rule or carrying parameters the
    /// rule does not accept.
    pub fn with_assumptions(
        input: Payload,
        assumptions: &[Assumption],
        config: ExpectorConfig,
    ) -> Result<Self, ExpectError> {
        let mut expector = Self::new(input, config);
        expector.assumed = derive_expectations(
            &expector.input,
            assumptions,
            expector.config.whitelist_coercion,
            &mut expector.next_index,
        )?;
        Ok(expector)
    }

    /// Construct from a JSON value, which must be an object.
    pub fn from_value(input: Value, config: ExpectorConfig) -> Result<Self, ExpectError> {
        match input {
            Value::Object(map) => Ok(Self::new(map, config)),
            other => Err(ExpectError::InvalidInput(format!(
                "expected an object, got {}",
                value_kind(&other)
            ))),
        }
    }

    pub fn config(&self) -> &ExpectorConfig {
        &self.config
    }

    /// The sanitized input.
    pub fn input(&self) -> &Payload {
        &self.input
    }

    /// Whether the next read will run an evaluation pass.
    pub fn is_dirty(&self) -> bool {
        self.evaluation.is_none()
    }

    /// Whether `field` carries at least one expectation, explicit or assumed.
    pub fn expects(&self, field: &str) -> bool {
        self.declared.contains_key(field) || self.assumed.contains_key(field)
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    /// Declare `rule` on every field in `fields`.
    pub fn expect(&mut self, fields: impl FieldSet, rule: Rule) -> &mut Self {
        self.declare(fields, rule, None)
    }

    /// Declare `rule` with a value the output takes when the rule rejects.
    pub fn expect_or(
        &mut self,
        fields: impl FieldSet,
        rule: Rule,
        default: impl Into<Value>,
    ) -> &mut Self {
        self.declare(fields, rule, Some(default.into()))
    }

    /// Declare a rule by registry name (canonical or alias) with positional
    /// parameters. One trailing parameter beyond the rule's arity is the
    /// failure default.
    pub fn expect_named(
        &mut self,
        fields: impl FieldSet,
        rule: &str,
        params: &[Value],
    ) -> Result<&mut Self, ExpectError> {
        let kind: RuleKind = rule.parse()?;
        let (rule, default) = kind.declare(params, self.config.whitelist_coercion)?;
        Ok(self.declare(fields, rule, default))
    }

    pub fn expect_integer(
        &mut self,
        fields: impl FieldSet,
        min: Option<i64>,
        max: Option<i64>,
    ) -> &mut Self {
        self.expect(fields, Rule::integer(min, max))
    }

    pub fn expect_positive_integer(&mut self, fields: impl FieldSet, max: Option<i64>) -> &mut Self {
        self.expect(fields, Rule::positive_integer(max))
    }

    pub fn expect_max(&mut self, fields: impl FieldSet, bound: impl Into<f64>) -> &mut Self {
        self.expect(fields, Rule::max(bound))
    }

    pub fn expect_slug(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect(fields, Rule::slug())
    }

    /// Whitelist rule, compared under the configured
    /// [`WhitelistCoercion`](crate::validation::rules::WhitelistCoercion).
    pub fn expect_in_array<I, V>(&mut self, fields: impl FieldSet, whitelist: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let rule = Rule::in_array(whitelist).with_coercion(self.config.whitelist_coercion);
        self.expect(fields, rule)
    }

    pub fn expect_bool(&mut self, fields: impl FieldSet, invalidate_on_absence: bool) -> &mut Self {
        self.expect(fields, Rule::bool(invalidate_on_absence))
    }

    pub fn expect_string(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect(fields, Rule::string())
    }

    /// Exempt `fields` from the presence requirement; when absent they take
    /// `default` in a valid output.
    ///
    /// Every field must already carry an expectation.
    pub fn optional(
        &mut self,
        fields: impl FieldSet,
        default: impl Into<Value>,
    ) -> Result<&mut Self, ExpectError> {
        let fields = fields.into_fields();
        if let Some(orphan) = fields.iter().find(|f| !self.expects(f)) {
            return Err(ExpectError::MisconfiguredOptional(orphan.clone()));
        }
        let default = default.into();
        for field in fields {
            self.optional_fields.insert(field, default.clone());
        }
        self.evaluation = None;
        Ok(self)
    }

    fn declare(&mut self, fields: impl FieldSet, rule: Rule, default: Option<Value>) -> &mut Self {
        let index = self.next_index;
        self.next_index += 1;

        for field in fields.into_fields() {
            let expectation = Expectation::new(rule.clone(), default.clone(), index);
            let slot = self.declared.entry(field.clone()).or_default();
            if let ConflictResolution::Overwritten { previous } = merge_expectation(slot, expectation) {
                tracing::trace!(
                    field = %field,
                    rule = %previous.kind(),
                    previous_index = previous.index,
                    "Overwrote earlier declaration"
                );
            }
        }

        self.evaluation = None;
        self
    }

    // -----------------------------------------------------------------------
    // Short aliases
    // -----------------------------------------------------------------------

    /// Alias of [`expect_integer`](Self::expect_integer) without bounds.
    pub fn dec(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect_integer(fields, None, None)
    }

    /// Alias of [`expect_positive_integer`](Self::expect_positive_integer)
    /// without an upper bound.
    pub fn decp(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect_positive_integer(fields, None)
    }

    pub fn slug(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect_slug(fields)
    }

    pub fn bool(&mut self, fields: impl FieldSet, invalidate_on_absence: bool) -> &mut Self {
        self.expect_bool(fields, invalidate_on_absence)
    }

    pub fn inarr<I, V>(&mut self, fields: impl FieldSet, whitelist: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.expect_in_array(fields, whitelist)
    }

    pub fn string(&mut self, fields: impl FieldSet) -> &mut Self {
        self.expect_string(fields)
    }

    pub fn max(&mut self, fields: impl FieldSet, bound: impl Into<f64>) -> &mut Self {
        self.expect_max(fields, bound)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Validated value of `field`, or `fallback` when the output holds
    /// nothing (or `null`) for it.
    ///
    /// Fails with [`ExpectError::UnsafeInput`] while invalid unless in force
    /// mode, and in strict mode with [`ExpectError::UnexpectedField`] for a
    /// field that was never declared.
    pub fn get(&mut self, field: &str, fallback: impl Into<Value>) -> Result<Value, ExpectError> {
        let force = self.config.force;
        let known = self.expects(field);
        let strict = self.config.strict;

        let evaluation = self.evaluate();
        if !evaluation.valid && !force {
            return Err(ExpectError::UnsafeInput);
        }
        if strict && !known {
            return Err(ExpectError::UnexpectedField(field.to_string()));
        }

        Ok(match evaluation.output.get(field) {
            Some(value) if !value.is_null() => value.clone(),
            _ => fallback.into(),
        })
    }

    /// The full output mapping, with the same gating as [`get`](Self::get).
    pub fn all(&mut self) -> Result<&Payload, ExpectError> {
        let force = self.config.force;
        let evaluation = self.evaluate();
        if !evaluation.valid && !force {
            return Err(ExpectError::UnsafeInput);
        }
        Ok(&evaluation.output)
    }

    /// Consume the engine and return the output mapping.
    pub fn into_output(mut self) -> Result<Payload, ExpectError> {
        self.all()?;
        match self.evaluation {
            Some(evaluation) => Ok(evaluation.output),
            None => Ok(Payload::new()),
        }
    }

    /// True iff every required field was present and passed all its rules.
    pub fn valid(&mut self) -> bool {
        self.evaluate().valid
    }

    /// Failures recorded by the last evaluation pass, in field order.
    pub fn violations(&mut self) -> &[FieldViolation] {
        &self.evaluate().violations
    }

    /// Names of the fields that failed. Each appears once.
    pub fn failed_fields(&mut self) -> Vec<String> {
        self.evaluate()
            .violations
            .iter()
            .map(|v| v.field.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    fn evaluate(&mut self) -> &Evaluation {
        let evaluation = match self.evaluation.take() {
            Some(cached) => cached,
            None => self.process(),
        };
        self.evaluation.insert(evaluation)
    }

    fn process(&self) -> Evaluation {
        let registry = layer_registries(&self.assumed, &self.declared);

        let mut optional_fields = self.optional_fields.clone();
        if self.config.flags.contains(Flags::ALL_OPTIONAL) {
            for field in registry.keys() {
                if !optional_fields.contains_key(field) && !self.input.contains_key(field) {
                    optional_fields.insert(field.clone(), Value::Null);
                }
            }
        }

        let mut output = Payload::new();
        let mut violations = Vec::new();
        let mut valid = true;

        for (field, expectations) in &registry {
            let mut candidate = match self.input.get(field) {
                Some(raw) => raw.clone(),
                None if optional_fields.contains_key(field) => continue,
                None if expectations.iter().any(|e| e.rule.accepts_absence()) => Value::Null,
                None => {
                    valid = false;
                    tracing::trace!(field = %field, "Required field missing");
                    violations.push(FieldViolation {
                        field: field.clone(),
                        rule_type: RULE_REQUIRED.to_string(),
                        message: "is required".to_string(),
                        value: None,
                    });
                    let default = expectations
                        .first()
                        .map_or(Value::Null, Expectation::failure_output);
                    output.insert(field.clone(), default);
                    continue;
                }
            };

            for expectation in expectations {
                match apply_rule(&expectation.rule, &candidate) {
                    Ok(coerced) => {
                        output.insert(field.clone(), coerced.clone());
                        candidate = coerced;
                    }
                    Err(rejection) => {
                        valid = false;
                        tracing::trace!(
                            field = %field,
                            rule = %expectation.kind(),
                            reason = %rejection.message,
                            "Field rejected"
                        );
                        violations.push(FieldViolation {
                            field: field.clone(),
                            rule_type: expectation.kind().as_str().to_string(),
                            message: rejection.message,
                            value: Some(candidate),
                        });
                        output.insert(field.clone(), expectation.failure_output());
                        break;
                    }
                }
            }
        }

        if valid {
            for (field, default) in &optional_fields {
                if !output.contains_key(field) {
                    output.insert(field.clone(), default.clone());
                }
            }
        }

        if self.config.flags.contains(Flags::EMPTY_STRING_TO_NULL) {
            sanitize::empty_strings_to_null(&mut output);
        }

        tracing::debug!(
            fields = registry.len(),
            valid,
            failures = violations.len(),
            "Evaluated expectations"
        );

        Evaluation {
            output,
            valid,
            violations,
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::validation::rules::WhitelistCoercion;

    fn expector(input: Value) -> Expector {
        Expector::from_value(input, ExpectorConfig::default()).unwrap()
    }

    fn forced(input: Value) -> Expector {
        Expector::from_value(input, ExpectorConfig::default().with_force(true)).unwrap()
    }

    #[test]
    fn starts_dirty_and_cleans_on_read() {
        let mut ex = expector(json!({"page": "2"}));
        assert!(ex.is_dirty());
        ex.decp("page");
        assert!(ex.valid());
        assert!(!ex.is_dirty());
    }

    #[test]
    fn declaration_after_read_re_dirties() {
        let mut ex = expector(json!({"page": "2", "sort": "a b"}));
        ex.decp("page");
        assert!(ex.valid());
        ex.slug("sort");
        assert!(ex.is_dirty());
        assert!(!ex.valid());
    }

    #[test]
    fn optional_re_dirties() {
        let mut ex = expector(json!({}));
        ex.decp("page");
        assert!(!ex.valid());
        ex.optional("page", 2).unwrap();
        assert!(ex.is_dirty());
        assert!(ex.valid());
        assert_eq!(ex.all().unwrap(), json!({"page": 2}).as_object().unwrap());
    }

    #[test]
    fn coerced_value_flows_to_next_rule() {
        let mut ex = expector(json!({"val": "4"}));
        ex.dec("val").inarr("val", [4]);
        assert_eq!(ex.all().unwrap(), json!({"val": 4}).as_object().unwrap());
    }

    #[test]
    fn first_failure_short_circuits_field() {
        let mut ex = forced(json!({"limit": "abc"}));
        ex.decp("limit").max("limit", 10);
        assert!(!ex.valid());
        let violations = ex.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_type, "positive_integer");
        assert_eq!(violations[0].value, Some(json!("abc")));
    }

    #[test]
    fn violation_records_coerced_value_of_later_rule() {
        let mut ex = forced(json!({"over_limit": "20"}));
        ex.decp("over_limit").max("over_limit", 10);
        assert!(!ex.valid());
        assert_eq!(ex.violations()[0].rule_type, "max");
        assert_eq!(ex.violations()[0].value, Some(json!(20)));
    }

    #[test]
    fn failed_field_takes_declared_default() {
        let mut ex = forced(json!({"sort": "not a slug", "page": "x"}));
        ex.expect_or("sort", Rule::slug(), "name").decp("page");
        assert!(!ex.valid());
        assert_eq!(
            ex.all().unwrap(),
            json!({"sort": "name", "page": null}).as_object().unwrap()
        );
        assert_eq!(ex.failed_fields(), ["sort", "page"]);
    }

    #[test]
    fn missing_required_field_takes_first_rule_default() {
        let mut ex = forced(json!({}));
        ex.expect_or("page", Rule::positive_integer(None), 1);
        assert!(!ex.valid());
        assert_eq!(ex.get("page", 9).unwrap(), json!(1));
        assert_eq!(ex.violations()[0].rule_type, RULE_REQUIRED);
    }

    #[test]
    fn absent_lenient_bool_reads_as_false() {
        let mut ex = expector(json!({}));
        ex.expect_bool("notify", false);
        assert!(ex.valid());
        assert_eq!(ex.all().unwrap(), json!({"notify": false}).as_object().unwrap());
    }

    #[test]
    fn absent_strict_bool_is_required() {
        let mut ex = forced(json!({}));
        ex.expect_bool("notify", true);
        assert!(!ex.valid());
        assert_eq!(ex.violations()[0].rule_type, RULE_REQUIRED);
        assert_eq!(ex.all().unwrap(), json!({"notify": false}).as_object().unwrap());
    }

    #[test]
    fn rejected_bool_without_default_outputs_false() {
        let mut ex = forced(json!({"b": "maybe"}));
        ex.bool("b", true);
        assert!(!ex.valid());
        assert_eq!(ex.violations()[0].rule_type, "bool");
        assert_eq!(ex.all().unwrap(), json!({"b": false}).as_object().unwrap());
    }

    #[test]
    fn unsafe_input_without_force() {
        let mut ex = expector(json!({"page": "zero"}));
        ex.decp("page");
        assert_matches!(ex.get("page", 1), Err(ExpectError::UnsafeInput));
        assert_matches!(ex.all(), Err(ExpectError::UnsafeInput));
        assert!(!ex.valid());
    }

    #[test]
    fn unexpected_field_in_strict_mode() {
        let mut ex = expector(json!({"page": "1", "debug": "1"}));
        ex.decp("page");
        assert_matches!(
            ex.get("debug", Value::Null),
            Err(ExpectError::UnexpectedField(f)) if f == "debug"
        );
    }

    #[test]
    fn lenient_mode_returns_fallback_for_unknown_field() {
        let config = ExpectorConfig::default().with_strict(false);
        let mut ex = Expector::from_value(json!({"debug": "1"}), config).unwrap();
        assert_eq!(ex.get("debug", "off").unwrap(), json!("off"));
    }

    #[test]
    fn get_returns_fallback_for_null_output() {
        let config = ExpectorConfig::default().with_flags(Flags::ALL_OPTIONAL);
        let mut ex = Expector::from_value(json!({}), config).unwrap();
        ex.decp("page");
        assert_eq!(ex.get("page", 3).unwrap(), json!(3));
    }

    #[test]
    fn optional_without_expectation_is_rejected() {
        let mut ex = expector(json!({}));
        assert_matches!(
            ex.optional("page", 2),
            Err(ExpectError::MisconfiguredOptional(f)) if f == "page"
        );
    }

    #[test]
    fn optional_rejection_registers_nothing() {
        let mut ex = expector(json!({}));
        ex.decp("page");
        assert!(ex.optional(["page", "limit"], 2).is_err());
        assert!(!ex.valid());
    }

    #[test]
    fn expect_named_resolves_aliases_and_defaults() {
        let mut ex = forced(json!({"limit": "500"}));
        ex.expect_named("limit", "decp", &[json!(100), json!(25)])
            .unwrap();
        assert!(!ex.valid());
        assert_eq!(ex.get("limit", 0).unwrap(), json!(25));
    }

    #[test]
    fn expect_named_unknown_rule() {
        let mut ex = expector(json!({}));
        assert_matches!(
            ex.expect_named("x", "uuid", &[]),
            Err(ExpectError::UnknownRule(r)) if r == "uuid"
        );
        assert!(ex.all().unwrap().is_empty());
    }

    #[test]
    fn in_array_follows_configured_coercion() {
        let config =
            ExpectorConfig::default().with_whitelist_coercion(WhitelistCoercion::GuessFromWhitelist);
        let mut ex = Expector::from_value(json!({"per_page": "90"}), config).unwrap();
        ex.inarr("per_page", [30, 60, 90]);
        assert_eq!(ex.get("per_page", 30).unwrap(), json!(90));
    }

    #[test]
    fn declaring_a_field_set() {
        let mut ex = expector(json!({"a": "1", "b": "2"}));
        ex.decp(["a", "b"]);
        assert_eq!(
            ex.all().unwrap(),
            json!({"a": 1, "b": 2}).as_object().unwrap()
        );
    }

    #[test]
    fn explicit_declaration_overrides_assumption() {
        let input = json!({"limit": "75"});
        let mut ex = Expector::with_assumptions(
            input.as_object().unwrap().clone(),
            &[Assumption::with_params("positive_integer", vec![json!(50)], "limit")],
            ExpectorConfig::default(),
        )
        .unwrap();
        assert!(!ex.valid());
        ex.expect_positive_integer("limit", Some(100));
        assert!(ex.valid());
        assert_eq!(ex.get("limit", 0).unwrap(), json!(75));
    }

    #[test]
    fn assumed_fields_count_as_expected() {
        let mut ex = Expector::with_assumptions(
            json!({"page": "2"}).as_object().unwrap().clone(),
            &[Assumption::new("positive_integer", ["page", "limit"])],
            ExpectorConfig::default(),
        )
        .unwrap();
        assert!(ex.expects("page"));
        assert!(!ex.expects("limit"));
        assert_eq!(ex.get("page", 1).unwrap(), json!(2));
    }

    #[test]
    fn empty_string_to_null_flag() {
        let config = ExpectorConfig::default().with_flags(Flags::EMPTY_STRING_TO_NULL);
        let mut ex = Expector::from_value(
            json!({"foo": "", "foo1": " ", "zero": 0, "bar": false}),
            config,
        )
        .unwrap();
        ex.string(["foo", "foo1"]).dec("zero").bool("bar", true);
        assert_eq!(
            ex.all().unwrap(),
            json!({"foo": null, "foo1": null, "zero": 0, "bar": false})
                .as_object()
                .unwrap()
        );
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert_matches!(
            Expector::from_value(json!([1, 2]), ExpectorConfig::default()),
            Err(ExpectError::InvalidInput(_))
        );
    }

    #[test]
    fn into_output_consumes() {
        let mut ex = expector(json!({"q": " term "}));
        ex.string("q");
        let output = ex.into_output().unwrap();
        assert_eq!(output["q"], json!("term"));
    }
}
