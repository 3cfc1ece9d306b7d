use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use stayrev_core::AppConfig;
use stayrev_embed::{
    EmbedError, GeminiEmbedder, QdrantStore, RetryPolicy, ReviewEmbeddingRequest, StoredVector,
    VectorStore,
};

use crate::middleware::RequestId;

use super::{normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

/// Embedder, vector store and retry policy shared by the embedding routes.
pub struct EmbeddingService {
    embedder: GeminiEmbedder,
    store: QdrantStore,
    policy: RetryPolicy,
}

impl EmbeddingService {
    #[must_use]
    pub fn new(embedder: GeminiEmbedder, store: QdrantStore, policy: RetryPolicy) -> Self {
        Self {
            embedder,
            store,
            policy,
        }
    }

    /// Build the service from config, or `None` when `GEMINI_API_KEY` is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Option<Self>, EmbedError> {
        let Some(api_key) = config.gemini_api_key.as_deref() else {
            return Ok(None);
        };
        let embedder = GeminiEmbedder::with_base_url(
            api_key,
            &config.embed_model,
            config.embed_dimension,
            config.embed_timeout_secs,
            &config.gemini_base_url,
        )?;
        let store = QdrantStore::new(
            &config.qdrant_url,
            &config.qdrant_collection,
            config.embed_dimension,
        )?;
        Ok(Some(Self::new(
            embedder,
            store,
            RetryPolicy::from_app_config(config),
        )))
    }

    #[must_use]
    pub fn store(&self) -> &QdrantStore {
        &self.store
    }

    /// Embed one review; outcome is only logged.
    async fn run(&self, request: ReviewEmbeddingRequest) {
        match stayrev_embed::embed_review(&self.embedder, &self.store, &self.policy, &request).await
        {
            Ok(outcome) => tracing::debug!(
                review_id = %outcome.review_id,
                "detached embedding finished"
            ),
            Err(EmbedError::QuotaExceeded { attempts }) => tracing::error!(
                review_id = %request.review_id,
                attempts,
                "embedding abandoned: quota exhausted"
            ),
            Err(e) => tracing::error!(
                review_id = %request.review_id,
                error = %e,
                "embedding failed"
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct EmbedAccepted {
    review_id: String,
    status: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct VectorsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct VectorsData {
    count: u64,
    entries: Vec<StoredVector>,
}

fn unavailable(request_id: String) -> ApiError {
    ApiError::new(
        request_id,
        "service_unavailable",
        "embedding is not configured",
    )
}

/// Accept a review for embedding and return 202 immediately.
///
/// The embedding runs as a detached task; quota retries can hold it for
/// tens of seconds and failures are only logged.
pub(super) async fn embed_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<ReviewEmbeddingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EmbedAccepted>>), ApiError> {
    let service = state
        .embedding
        .clone()
        .ok_or_else(|| unavailable(req_id.0.clone()))?;

    if request.review_id.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "review_id must not be empty",
        ));
    }
    if request.text.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "text must not be empty",
        ));
    }

    let review_id = request.review_id.clone();
    tracing::info!(review_id = %review_id, hotel_id = request.hotel_id, "embedding accepted");
    tokio::spawn(async move { service.run(request).await });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: EmbedAccepted {
                review_id,
                status: "accepted",
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_vectors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<VectorsQuery>,
) -> Result<Json<ApiResponse<VectorsData>>, ApiError> {
    let service = state
        .embedding
        .as_ref()
        .ok_or_else(|| unavailable(req_id.0.clone()))?;
    let limit = usize::try_from(normalize_limit(query.limit)).unwrap_or(50);

    let store_error = |e: EmbedError| {
        tracing::error!(error = %e, "vector store query failed");
        ApiError::new(req_id.0.clone(), "upstream_error", "vector store query failed")
    };
    let count = service.store().count().await.map_err(store_error)?;
    let entries = service.store().peek(limit).await.map_err(store_error)?;

    Ok(Json(ApiResponse {
        data: VectorsData { count, entries },
        meta: ResponseMeta::new(req_id.0),
    }))
}
