//! Review embedding pipeline.
//!
//! Embeds review text via the Gemini embedding API, retrying only on quota
//! rejections, and upserts vectors into Qdrant keyed by review id.
//! [`MemoryVectorStore`] stands in for Qdrant in tests and dry runs.

pub mod embeddings;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod types;
pub mod vector_store;

pub use embeddings::{Embedder, GeminiEmbedder};
pub use error::EmbedError;
pub use pipeline::embed_review;
pub use retry::{retry_on_quota, RetryPolicy};
pub use types::{EmbedOutcome, ReviewEmbeddingRequest, StoredVector};
pub use vector_store::{review_id_to_point_id, MemoryVectorStore, QdrantStore, VectorStore};
