//! Review analysis: prompt construction, the Gemini text-generation client,
//! response parsing and mapping onto the canonical review schema.

pub mod client;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod response;

pub use client::GeminiClient;
pub use error::AnalyzerError;
pub use normalize::{normalize_batch, parse_record_id, FieldIssue, NormalizedBatch, Severity};
pub use pipeline::analyze_batch;
pub use prompt::{build_payload, build_prompt, RESPONSE_SCHEMA_VERSION};
pub use response::{parse_review_array, strip_markdown_fences};
