//! Engine configuration.

use serde::Deserialize;

use crate::error::ExpectError;
use crate::flags::Flags;
use crate::validation::rules::WhitelistCoercion;

/// Construction-time policy of an [`Expector`](crate::expector::Expector).
///
/// All fields have defaults giving strict, fail-closed behavior. Can be
/// embedded in a caller's own configuration file or loaded from the
/// environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExpectorConfig {
    /// Allow `get`/`all` to return best-effort output while invalid
    /// (default: `false`).
    pub force: bool,
    /// Reject `get` on fields that were never declared (default: `true`).
    pub strict: bool,
    /// Post-processing and presence switches (default: none).
    pub flags: Flags,
    /// How `in_array` compares candidates against the whitelist
    /// (default: [`WhitelistCoercion::Strict`]).
    pub whitelist_coercion: WhitelistCoercion,
}

impl Default for ExpectorConfig {
    fn default() -> Self {
        Self {
            force: false,
            strict: true,
            flags: Flags::empty(),
            whitelist_coercion: WhitelistCoercion::Strict,
        }
    }
}

impl ExpectorConfig {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_whitelist_coercion(mut self, coercion: WhitelistCoercion) -> Self {
        self.whitelist_coercion = coercion;
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default  |
    /// |----------------------------|----------|
    /// | `SIEVE_FORCE`              | `false`  |
    /// | `SIEVE_STRICT`             | `true`   |
    /// | `SIEVE_FLAGS`              | `0`      |
    /// | `SIEVE_WHITELIST_COERCION` | `strict` |
    pub fn from_env() -> Result<Self, ExpectError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExpectError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let force = match lookup("SIEVE_FORCE") {
            Some(raw) => parse_switch("SIEVE_FORCE", &raw)?,
            None => defaults.force,
        };

        let strict = match lookup("SIEVE_STRICT") {
            Some(raw) => parse_switch("SIEVE_STRICT", &raw)?,
            None => defaults.strict,
        };

        let flags = match lookup("SIEVE_FLAGS") {
            Some(raw) => raw
                .trim()
                .parse::<u8>()
                .map(Flags::from_bits_truncate)
                .map_err(|_| {
                    ExpectError::Config(format!("SIEVE_FLAGS must be a valid u8, got '{raw}'"))
                })?,
            None => defaults.flags,
        };

        let whitelist_coercion = match lookup("SIEVE_WHITELIST_COERCION") {
            Some(raw) => raw.trim().parse::<WhitelistCoercion>()?,
            None => defaults.whitelist_coercion,
        };

        Ok(Self {
            force,
            strict,
            flags,
            whitelist_coercion,
        })
    }
}

fn parse_switch(key: &str, raw: &str) -> Result<bool, ExpectError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ExpectError::Config(format!(
            "{key} must be a boolean switch, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_strict() {
        let config = ExpectorConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ExpectorConfig::default());
        assert!(!config.force);
        assert!(config.strict);
    }

    #[test]
    fn reads_every_variable() {
        let config = ExpectorConfig::from_lookup(lookup_from(&[
            ("SIEVE_FORCE", "yes"),
            ("SIEVE_STRICT", "0"),
            ("SIEVE_FLAGS", "3"),
            ("SIEVE_WHITELIST_COERCION", "guess"),
        ]))
        .unwrap();
        assert!(config.force);
        assert!(!config.strict);
        assert!(config.flags.contains(Flags::ALL_OPTIONAL));
        assert!(config.flags.contains(Flags::EMPTY_STRING_TO_NULL));
        assert_eq!(
            config.whitelist_coercion,
            WhitelistCoercion::GuessFromWhitelist
        );
    }

    #[test]
    fn rejects_garbage_switch() {
        let result = ExpectorConfig::from_lookup(lookup_from(&[("SIEVE_FORCE", "maybe")]));
        assert_matches!(result, Err(ExpectError::Config(_)));
    }

    #[test]
    fn rejects_non_numeric_flags() {
        let result = ExpectorConfig::from_lookup(lookup_from(&[("SIEVE_FLAGS", "all")]));
        assert_matches!(result, Err(ExpectError::Config(_)));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ExpectorConfig =
            serde_json::from_value(serde_json::json!({"force": true, "flags": 1})).unwrap();
        assert!(config.force);
        assert!(config.strict);
        assert_eq!(config.flags, Flags::EMPTY_STRING_TO_NULL);
    }
}
