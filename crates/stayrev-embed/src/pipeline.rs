//! Per-review embedding pipeline.

use serde_json::{Map, Value};

use crate::embeddings::Embedder;
use crate::error::EmbedError;
use crate::retry::{retry_on_quota, RetryPolicy};
use crate::types::{EmbedOutcome, ReviewEmbeddingRequest};
use crate::vector_store::VectorStore;

/// Embed one review and upsert it into `store` under its review id.
///
/// Each call is independent; calls for distinct review ids can run
/// concurrently against the same store. A rate-limited embedding request
/// blocks the calling task for up to `(max_attempts - 1)` retry delays.
///
/// # Errors
///
/// - [`EmbedError::EmptyText`] if the text is blank.
/// - [`EmbedError::Dimension`] if the embedder and store disagree on vector
///   length; checked before any request is made.
/// - [`EmbedError::QuotaExceeded`] if every attempt was rate limited.
/// - Any other [`EmbedError`] from the embedder or the store, unretried.
pub async fn embed_review<E, S>(
    embedder: &E,
    store: &S,
    policy: &RetryPolicy,
    request: &ReviewEmbeddingRequest,
) -> Result<EmbedOutcome, EmbedError>
where
    E: Embedder,
    S: VectorStore,
{
    let text = request.text.trim();
    if text.is_empty() {
        return Err(EmbedError::EmptyText);
    }
    if embedder.dimension() != store.dimension() {
        return Err(EmbedError::Dimension {
            expected: store.dimension(),
            actual: embedder.dimension(),
        });
    }

    let vector = retry_on_quota(policy, || embedder.embed(text)).await?;
    let dimension = vector.len();

    let mut metadata = Map::new();
    metadata.insert("hotel_id".to_string(), Value::from(request.hotel_id));

    store.upsert(&request.review_id, vector, metadata).await?;

    tracing::info!(
        review_id = %request.review_id,
        hotel_id = request.hotel_id,
        dimension,
        "stored review embedding"
    );

    Ok(EmbedOutcome {
        review_id: request.review_id.clone(),
        dimension,
    })
}
