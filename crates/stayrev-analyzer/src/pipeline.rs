//! End-to-end analysis of one raw batch: prompt, model call, parse, map.

use stayrev_core::RawReview;

use crate::client::GeminiClient;
use crate::error::AnalyzerError;
use crate::normalize::{normalize_batch, NormalizedBatch};
use crate::prompt::build_prompt;
use crate::response::parse_review_array;

/// Analyze a batch of raw reviews with the model and map the result.
///
/// An empty batch short-circuits without calling the model.
///
/// # Errors
///
/// Propagates every [`AnalyzerError`] from the client, the parser and the
/// mapper. Malformed model output is never retried.
pub async fn analyze_batch(
    client: &GeminiClient,
    raws: &[RawReview],
) -> Result<NormalizedBatch, AnalyzerError> {
    if raws.is_empty() {
        tracing::info!("no raw reviews to analyze");
        return Ok(NormalizedBatch::default());
    }

    let prompt = build_prompt(raws)?;
    tracing::info!(
        reviews = raws.len(),
        prompt_bytes = prompt.len(),
        model = client.model(),
        "requesting review analysis"
    );

    let text = client.generate(&prompt).await?;
    let records = parse_review_array(&text)?;
    tracing::info!(records = records.len(), "model returned review records");

    let batch = normalize_batch(records, raws)?;
    tracing::info!(
        reviews = batch.reviews.len(),
        recovered_issues = batch.issues.len(),
        "normalized review batch"
    );
    Ok(batch)
}
