//! Text encoding for array columns (`categories`, `key_phrases`).
//!
//! Arrays are stored as JSON text. Decoding never fails: an absent, empty or
//! malformed value decodes to an empty list so one bad row cannot fail a
//! whole read.

use serde_json::Value;

/// Encode a list of strings as a JSON array string.
#[must_use]
pub fn encode_string_list<S: AsRef<str>>(items: &[S]) -> String {
    let values: Vec<Value> = items
        .iter()
        .map(|s| Value::String(s.as_ref().to_owned()))
        .collect();
    Value::Array(values).to_string()
}

/// Decode a stored JSON array string, recovering to an empty list on any
/// malformation. Non-string array elements are dropped.
#[must_use]
pub fn decode_string_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                other => {
                    tracing::warn!(element = %other, "dropping non-string element from stored array");
                    None
                }
            })
            .collect(),
        Ok(other) => {
            tracing::warn!(value = %other, "stored array column is not a JSON array; using empty list");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, raw, "stored array column is not valid JSON; using empty list");
            Vec::new()
        }
    }
}
