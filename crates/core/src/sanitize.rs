//! One-time input sanitization and output post-processing.
//!
//! Both walks visit every leaf of nested objects and arrays.

use serde_json::Value;

use crate::types::Payload;

/// Trim surrounding whitespace from every string leaf, at any depth.
pub fn trim_strings(payload: &mut Payload) {
    for value in payload.values_mut() {
        trim_value(value);
    }
}

fn trim_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.trim().len() != s.len() {
                *s = s.trim().to_string();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(trim_value),
        Value::Object(map) => map.values_mut().for_each(trim_value),
        _ => {}
    }
}

/// Replace every empty string leaf with `null`, at any depth.
pub fn empty_strings_to_null(payload: &mut Payload) {
    for value in payload.values_mut() {
        empty_to_null(value);
    }
}

fn empty_to_null(value: &mut Value) {
    if value.as_str() == Some("") {
        *value = Value::Null;
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(empty_to_null),
        Value::Object(map) => map.values_mut().for_each(empty_to_null),
        _ => {}
    }
}
