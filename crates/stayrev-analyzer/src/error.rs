use thiserror::Error;

use crate::normalize::FieldIssue;

/// Errors returned by the review analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The analysis service answered with a non-2xx status.
    #[error("analysis API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered 2xx but produced no candidate text.
    #[error("analysis API returned no candidate text")]
    EmptyResponse,

    /// The model output is not a JSON array of objects. `raw` is the text
    /// exactly as received.
    #[error("model output is not a JSON array of review objects: {reason}")]
    Format { reason: String, raw: String },

    /// One or more records violate the response contract in a way that
    /// cannot be defaulted.
    #[error("{} field issue(s) failed validation: {}", issues.len(), summarize(issues))]
    Schema { issues: Vec<FieldIssue> },

    /// The request payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
