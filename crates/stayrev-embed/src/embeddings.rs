//! Gemini `embedContent` client for review vectors.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Marker the API puts in error bodies when a quota is exhausted.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Produces one fixed-dimension vector per text.
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed one text.
    ///
    /// Rate-limit rejections must surface as [`EmbedError::RateLimited`] so
    /// the retry policy can tell them apart from other failures.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbedError>> + Send;
}

/// Embedding client for one Gemini embedding model.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: [EmbedPart<'a>; 1],
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout_secs: u64,
    ) -> Result<Self, EmbedError> {
        Self::with_base_url(api_key, model, dimension, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Point at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("stayrev/0.1 (review-embedding)")
            .build()?;

        let model = if model.starts_with("models/") {
            model.to_owned()
        } else {
            format!("models/{model}")
        };

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            url: format!(
                "{}/v1beta/{model}:embedContent",
                base_url.trim_end_matches('/')
            ),
            model,
            dimension,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyText);
        }

        let body = EmbedRequest {
            model: &self.model,
            content: EmbedContent {
                parts: [EmbedPart { text }],
            },
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Deserialize(e.to_string()))?;

        let values = parsed.embedding.values;
        if values.len() != self.dimension {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

impl Embedder for GeminiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.request(text).await
    }
}

/// Map a non-2xx response onto a rate-limit or a plain API error.
pub(crate) fn classify_failure(status: u16, body: String) -> EmbedError {
    if status == 429 || body.contains(RESOURCE_EXHAUSTED) {
        EmbedError::RateLimited(format!("status {status}"))
    } else {
        EmbedError::Api { status, body }
    }
}
