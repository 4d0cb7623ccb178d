use serde_json::Value;

/// Untyped associative request data (form body, query string, JSON object).
/// Insertion order is preserved.
pub type Payload = serde_json::Map<String, Value>;

/// Something that names one field or a set of fields.
///
/// Every declaration method accepts either a single name or a collection of
/// names and applies the same rule to each.
pub trait FieldSet {
    fn into_fields(self) -> Vec<String>;
}

impl FieldSet for &str {
    fn into_fields(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl FieldSet for String {
    fn into_fields(self) -> Vec<String> {
        vec![self]
    }
}

impl FieldSet for &String {
    fn into_fields(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl FieldSet for &[&str] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|f| f.to_string()).collect()
    }
}

impl<const N: usize> FieldSet for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|f| f.to_string()).collect()
    }
}

impl FieldSet for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl FieldSet for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl FieldSet for &[String] {
    fn into_fields(self) -> Vec<String> {
        self.to_vec()
    }
}
