use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One review to embed, as received from the route layer or the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEmbeddingRequest {
    /// Key of the vector in the store; re-embedding the same id overwrites.
    pub review_id: String,
    pub text: String,
    pub hotel_id: i64,
}

/// A stored vector as returned by [`crate::VectorStore::peek`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredVector {
    pub review_id: String,
    pub metadata: Map<String, Value>,
}

/// Result of a successful [`crate::embed_review`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedOutcome {
    pub review_id: String,
    pub dimension: usize,
}
