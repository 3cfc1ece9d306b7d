//! Embedding commands: single review, backfill, and vector store inspection.

use clap::Subcommand;
use futures::stream::{self, StreamExt};
use stayrev_core::{AppConfig, NormalizedReview};
use stayrev_embed::{
    embed_review, Embedder, GeminiEmbedder, QdrantStore, RetryPolicy, ReviewEmbeddingRequest,
    VectorStore,
};

/// Sub-commands available under `vectors`.
#[derive(Debug, Subcommand)]
pub enum VectorCommands {
    /// Print the number of stored vectors
    Count,
    /// Print the first stored entries with their metadata
    Peek {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

/// Tally of a backfill pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BackfillSummary {
    pub embedded: usize,
    pub failed: usize,
}

fn build_embedder(config: &AppConfig) -> anyhow::Result<GeminiEmbedder> {
    let api_key = config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set; cannot embed reviews"))?;
    GeminiEmbedder::with_base_url(
        api_key,
        &config.embed_model,
        config.embed_dimension,
        config.embed_timeout_secs,
        &config.gemini_base_url,
    )
    .map_err(|e| anyhow::anyhow!("failed to build embedder: {e}"))
}

async fn open_store(config: &AppConfig) -> anyhow::Result<QdrantStore> {
    let store = QdrantStore::new(
        &config.qdrant_url,
        &config.qdrant_collection,
        config.embed_dimension,
    )?;
    store.ensure_collection().await?;
    Ok(store)
}

/// Embed one review and print the outcome.
///
/// # Errors
///
/// Returns an error if the embedder or store cannot be built, or the
/// embedding fails (including quota exhaustion after all retries).
pub(crate) async fn run_embed(
    config: &AppConfig,
    review_id: String,
    text: String,
    hotel_id: i64,
) -> anyhow::Result<()> {
    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let policy = RetryPolicy::from_app_config(config);

    let request = ReviewEmbeddingRequest {
        review_id,
        text,
        hotel_id,
    };
    let outcome = embed_review(&embedder, &store, &policy, &request).await?;
    println!(
        "embedded {} ({} dimensions)",
        outcome.review_id, outcome.dimension
    );
    Ok(())
}

/// Embed every review in the normalized store.
///
/// Per-review failures are logged and counted; the command fails only when
/// every review failed.
///
/// # Errors
///
/// Returns an error if the store cannot be read, the embedder or vector
/// store cannot be built, or no review could be embedded.
pub(crate) async fn run_backfill(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    hotel_id: i64,
    concurrency: usize,
) -> anyhow::Result<()> {
    let reviews = stayrev_db::list_processed_reviews(pool).await?;
    let requests = backfill_requests(&reviews, hotel_id);
    if requests.is_empty() {
        println!("no normalized reviews with text to embed");
        return Ok(());
    }

    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    let policy = RetryPolicy::from_app_config(config);

    let summary = embed_all(&embedder, &store, &policy, &requests, concurrency).await;
    if summary.embedded == 0 {
        anyhow::bail!("all {} embeddings failed", summary.failed);
    }
    println!(
        "backfill complete: {} embedded, {} failed",
        summary.embedded, summary.failed
    );
    Ok(())
}

/// Build one embedding request per review that has non-blank text.
pub(crate) fn backfill_requests(
    reviews: &[NormalizedReview],
    hotel_id: i64,
) -> Vec<ReviewEmbeddingRequest> {
    reviews
        .iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(|r| ReviewEmbeddingRequest {
            review_id: r.id.clone(),
            text: r.text.clone(),
            hotel_id,
        })
        .collect()
}

/// Run [`embed_review`] over `requests` with at most `concurrency` in flight.
pub(crate) async fn embed_all<E, S>(
    embedder: &E,
    store: &S,
    policy: &RetryPolicy,
    requests: &[ReviewEmbeddingRequest],
    concurrency: usize,
) -> BackfillSummary
where
    E: Embedder,
    S: VectorStore,
{
    let mut results = stream::iter(requests)
        .map(|request| async move {
            let result = embed_review(embedder, store, policy, request).await;
            (request, result)
        })
        .buffer_unordered(concurrency.max(1));

    let mut summary = BackfillSummary::default();
    while let Some((request, result)) = results.next().await {
        match result {
            Ok(_) => summary.embedded += 1,
            Err(e) => {
                tracing::error!(
                    review_id = %request.review_id,
                    error = %e,
                    "failed to embed review"
                );
                summary.failed += 1;
            }
        }
    }
    summary
}

/// # Errors
///
/// Returns an error if the vector store is unreachable.
pub(crate) async fn run_vectors(config: &AppConfig, command: VectorCommands) -> anyhow::Result<()> {
    let store = QdrantStore::new(
        &config.qdrant_url,
        &config.qdrant_collection,
        config.embed_dimension,
    )?;
    match command {
        VectorCommands::Count => {
            let count = store.count().await?;
            println!("{count} vectors in {}", config.qdrant_collection);
        }
        VectorCommands::Peek { limit } => {
            for entry in store.peek(limit).await? {
                println!(
                    "{}  {}",
                    entry.review_id,
                    serde_json::Value::Object(entry.metadata)
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stayrev_core::{EmbedBackoff, HasReply, ReviewStatus, Sentiment};
    use stayrev_embed::{EmbedError, MemoryVectorStore};

    use super::*;

    /// Embeds every text except those containing "fail".
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn dimension(&self) -> usize {
            1
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.contains("fail") {
                Err(EmbedError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok(vec![1.0])
            }
        }
    }

    fn review(id: &str, text: &str) -> NormalizedReview {
        NormalizedReview {
            id: id.to_string(),
            platform_review_id: None,
            rating: 3,
            user_name: "Anonymous".to_string(),
            reviewer_name: "Anonymous".to_string(),
            text: text.to_string(),
            review_text: text.to_string(),
            summary: None,
            sentiment: Sentiment::Neutral,
            language: "English".to_string(),
            categories: Vec::new(),
            key_phrases: Vec::new(),
            photos: Vec::new(),
            source: "Booking.com".to_string(),
            date: None,
            status: ReviewStatus::Pending,
            reply_status: ReviewStatus::Pending,
            has_reply: HasReply::No,
            first_seen: None,
            last_updated: None,
            scraped_at: None,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff: EmbedBackoff::Fixed,
        }
    }

    #[test]
    fn backfill_skips_blank_text_and_tags_hotel() {
        let reviews = vec![
            review("REV-000001", "Clean room"),
            review("REV-000002", "   "),
            review("REV-000003", "Noisy street"),
        ];
        let requests = backfill_requests(&reviews, 9);
        let ids: Vec<&str> = requests.iter().map(|r| r.review_id.as_str()).collect();
        assert_eq!(ids, vec!["REV-000001", "REV-000003"]);
        assert!(requests.iter().all(|r| r.hotel_id == 9));
    }

    #[tokio::test]
    async fn embed_all_counts_successes_and_failures() {
        let store = MemoryVectorStore::new(1);
        let requests = backfill_requests(
            &[
                review("REV-000001", "fine"),
                review("REV-000002", "fail please"),
                review("REV-000003", "also fine"),
            ],
            1,
        );

        let summary = embed_all(&StubEmbedder, &store, &policy(), &requests, 2).await;

        assert_eq!(
            summary,
            BackfillSummary {
                embedded: 2,
                failed: 1
            }
        );
        assert_eq!(store.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let store = MemoryVectorStore::new(1);
        let requests = backfill_requests(&[review("REV-000001", "fine")], 1);
        let summary = embed_all(&StubEmbedder, &store, &policy(), &requests, 0).await;
        assert_eq!(summary.embedded, 1);
    }
}
