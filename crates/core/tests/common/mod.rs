use serde_json::Value;

use sieve_core::{Expector, ExpectorConfig, Flags, Payload};

/// Route engine tracing to the test harness's captured output.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sieve_core=trace".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Unwrap a `json!` object fixture into a payload.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

/// Strict engine with default configuration.
pub fn expector(input: Value) -> Expector {
    init_tracing();
    Expector::new(payload(input), ExpectorConfig::default())
}

/// Engine constructed with the given flags.
pub fn expector_with_flags(input: Value, flags: Flags) -> Expector {
    init_tracing();
    Expector::new(payload(input), ExpectorConfig::default().with_flags(flags))
}
