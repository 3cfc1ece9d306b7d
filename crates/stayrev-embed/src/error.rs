use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// Network or TLS failure talking to the embedding service or the store.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response that is not a rate limit.
    #[error("embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// One rate-limit / quota rejection. Retried by [`crate::retry_on_quota`].
    #[error("embedding API rate limited: {0}")]
    RateLimited(String),

    /// Rate limiting persisted through every allowed attempt.
    #[error("embedding quota exceeded after {attempts} attempt(s)")]
    QuotaExceeded { attempts: u32 },

    #[error("embedding response could not be decoded: {0}")]
    Deserialize(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("review text is empty")]
    EmptyText,

    #[error("vector store error: {0}")]
    Store(String),
}
