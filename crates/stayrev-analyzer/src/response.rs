//! Extraction of the review array from raw model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::AnalyzerError;

// One fenced block spanning the whole (trimmed) text, optionally tagged `json`.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```(?:json)?\s*(.*?)\s*```\s*\z").expect("valid fence regex")
});

/// Remove a surrounding Markdown code fence, if the whole text is one.
///
/// Text that is not exactly one fenced block is returned unchanged.
#[must_use]
pub fn strip_markdown_fences(text: &str) -> &str {
    FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Parse model output into a list of JSON objects.
///
/// # Errors
///
/// Returns [`AnalyzerError::Format`] if the text (after fence stripping) is
/// not JSON, not a top-level array, or contains a non-object element. The
/// error carries the original text verbatim.
pub fn parse_review_array(text: &str) -> Result<Vec<Map<String, Value>>, AnalyzerError> {
    let format_err = |reason: String| AnalyzerError::Format {
        reason,
        raw: text.to_owned(),
    };

    let value: Value = serde_json::from_str(strip_markdown_fences(text))
        .map_err(|e| format_err(format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(format_err(format!(
            "expected a top-level array, found {}",
            kind(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(format_err(format!(
                "element {index} is {}, expected an object",
                kind(&other)
            ))),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_tagged_fence() {
        assert_eq!(strip_markdown_fences("```json\n[1]\n```"), "[1]");
    }

    #[test]
    fn strips_untagged_fence_with_surrounding_whitespace() {
        assert_eq!(strip_markdown_fences("  \n```\n[]\n```\n "), "[]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_markdown_fences("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn does_not_strip_fence_embedded_in_prose() {
        let text = "Here you go:\n```json\n[]\n```";
        assert_eq!(strip_markdown_fences(text), text);
    }

    #[test]
    fn parses_fenced_array_of_objects() {
        let records = parse_review_array("```json\n[{\"id\": 1}, {\"id\": 2}]\n```").expect("parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("id"), Some(&Value::from(2)));
    }

    #[test]
    fn non_json_is_format_error_with_verbatim_text() {
        let text = "Sorry, I cannot help with that.";
        match parse_review_array(text) {
            Err(AnalyzerError::Format { raw, .. }) => assert_eq!(raw, text),
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn object_at_top_level_is_format_error() {
        let text = "```json\n{\"reviews\": []}\n```";
        match parse_review_array(text) {
            Err(AnalyzerError::Format { reason, raw }) => {
                assert!(reason.contains("top-level array"), "{reason}");
                assert_eq!(raw, text);
            }
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn non_object_element_is_format_error() {
        assert!(matches!(
            parse_review_array("[{\"id\": 1}, 2]"),
            Err(AnalyzerError::Format { .. })
        ));
    }

    #[test]
    fn empty_array_is_ok() {
        assert!(parse_review_array("[]").expect("parse").is_empty());
    }
}
