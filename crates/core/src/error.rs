/// Errors surfaced to callers of the expectation engine.
///
/// Every variant is a configuration or usage mistake. Data that fails
/// validation is never an error by itself; it is recorded as a
/// [`FieldViolation`](crate::validation::rules::FieldViolation) and reflected
/// in `Expector::valid`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpectError {
    #[error("Unsafe input: results read while validation failed")]
    UnsafeInput,

    #[error("Unexpected field: {0} has no declared expectation")]
    UnexpectedField(String),

    #[error("Misconfigured optional field: {0} has an optional value but no expectation")]
    MisconfiguredOptional(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Invalid parameters for rule {rule}: {message}")]
    InvalidParameters { rule: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExpectError {
    pub(crate) fn invalid_parameters(rule: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}
