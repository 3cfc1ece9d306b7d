//! Vector stores keyed by review id.
//!
//! Both implementations upsert idempotently: storing a vector for an id that
//! already exists replaces it.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::EmbedError;
use crate::types::StoredVector;

/// Payload key holding the review id on every stored point.
pub const REVIEW_ID_KEY: &str = "review_id";

pub trait VectorStore: Send + Sync {
    /// Length every stored vector must have.
    fn dimension(&self) -> usize;

    /// Insert or replace the vector stored under `review_id`.
    fn upsert(
        &self,
        review_id: &str,
        vector: Vec<f32>,
        metadata: Map<String, Value>,
    ) -> impl Future<Output = Result<(), EmbedError>> + Send;

    fn count(&self) -> impl Future<Output = Result<u64, EmbedError>> + Send;

    /// Up to `limit` stored entries, without their vectors.
    fn peek(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StoredVector>, EmbedError>> + Send;
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbedError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(EmbedError::Dimension {
            expected,
            actual: vector.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Qdrant
// ---------------------------------------------------------------------------

/// Qdrant HTTP client for one collection.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Serialize)]
struct VectorsConfig {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPointsRequest {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrolledPoint>,
}

#[derive(Deserialize)]
struct ScrolledPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantStore {
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] if the HTTP client cannot be built.
    pub fn new(qdrant_url: &str, collection: &str, dimension: usize) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: qdrant_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dimension,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    /// Ensure the collection exists, creating it (cosine distance) if absent.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] on network failure or [`EmbedError::Store`]
    /// if creation is rejected.
    pub async fn ensure_collection(&self) -> Result<(), EmbedError> {
        let url = self.collection_url("");
        if let Ok(resp) = self.client.get(&url).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }

        let body = CreateCollectionRequest {
            vectors: VectorsConfig {
                size: self.dimension,
                distance: "Cosine",
            },
        };
        let resp = self.client.put(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(EmbedError::Store(format!(
                "collection create returned status {}",
                resp.status()
            )));
        }

        tracing::info!(
            collection = %self.collection,
            dimension = self.dimension,
            "created vector collection"
        );
        Ok(())
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        suffix: &str,
        body: &B,
    ) -> Result<T, EmbedError> {
        let resp = self
            .client
            .post(self.collection_url(suffix))
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(EmbedError::Store(format!(
                "{suffix} returned status {}",
                resp.status()
            )));
        }
        let envelope: QdrantEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| EmbedError::Store(format!("{suffix} response parse error: {e}")))?;
        Ok(envelope.result)
    }
}

impl VectorStore for QdrantStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(
        &self,
        review_id: &str,
        vector: Vec<f32>,
        mut metadata: Map<String, Value>,
    ) -> Result<(), EmbedError> {
        check_dimension(self.dimension, &vector)?;
        metadata.insert(REVIEW_ID_KEY.to_string(), Value::from(review_id));

        let body = UpsertPointsRequest {
            points: vec![Point {
                id: review_id_to_point_id(review_id),
                vector,
                payload: metadata,
            }],
        };

        let resp = self
            .client
            .put(self.collection_url("/points"))
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EmbedError::Store(format!(
                "upsert returned status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, EmbedError> {
        let result: CountResult = self
            .post_json("/points/count", &serde_json::json!({ "exact": true }))
            .await?;
        Ok(result.count)
    }

    async fn peek(&self, limit: usize) -> Result<Vec<StoredVector>, EmbedError> {
        let body = serde_json::json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let result: ScrollResult = self.post_json("/points/scroll", &body).await?;
        Ok(result
            .points
            .into_iter()
            .map(|p| stored_from_payload(p.payload.unwrap_or_default()))
            .collect())
    }
}

fn stored_from_payload(mut payload: Map<String, Value>) -> StoredVector {
    let review_id = match payload.remove(REVIEW_ID_KEY) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    StoredVector {
        review_id,
        metadata: payload,
    }
}

/// Derive a stable Qdrant point id from a review id.
///
/// Takes the first 8 bytes of SHA-256(review id) as a big-endian u64.
#[must_use]
pub fn review_id_to_point_id(review_id: &str) -> u64 {
    let hash = Sha256::digest(review_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(bytes)
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store, used in tests and dry runs.
#[derive(Debug)]
pub struct MemoryVectorStore {
    dimension: usize,
    entries: RwLock<BTreeMap<String, (Vec<f32>, Map<String, Value>)>>,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Vector stored under `review_id`, if any.
    pub async fn vector(&self, review_id: &str) -> Option<Vec<f32>> {
        self.entries
            .read()
            .await
            .get(review_id)
            .map(|(vector, _)| vector.clone())
    }
}

impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(
        &self,
        review_id: &str,
        vector: Vec<f32>,
        metadata: Map<String, Value>,
    ) -> Result<(), EmbedError> {
        check_dimension(self.dimension, &vector)?;
        self.entries
            .write()
            .await
            .insert(review_id.to_string(), (vector, metadata));
        Ok(())
    }

    async fn count(&self) -> Result<u64, EmbedError> {
        Ok(u64::try_from(self.entries.read().await.len()).unwrap_or(u64::MAX))
    }

    async fn peek(&self, limit: usize) -> Result<Vec<StoredVector>, EmbedError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .take(limit)
            .map(|(id, (_, metadata))| StoredVector {
                review_id: id.clone(),
                metadata: metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(hotel_id: i64) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("hotel_id".to_string(), Value::from(hotel_id));
        m
    }

    #[test]
    fn point_id_is_stable() {
        assert_eq!(
            review_id_to_point_id("REV-000101"),
            review_id_to_point_id("REV-000101")
        );
    }

    #[test]
    fn different_review_ids_produce_different_point_ids() {
        assert_ne!(
            review_id_to_point_id("REV-000101"),
            review_id_to_point_id("REV-000102")
        );
    }

    #[test]
    fn payload_review_id_is_split_from_metadata() {
        let mut payload = meta(7);
        payload.insert(REVIEW_ID_KEY.to_string(), Value::from("REV-000001"));
        let stored = stored_from_payload(payload);
        assert_eq!(stored.review_id, "REV-000001");
        assert_eq!(stored.metadata, meta(7));
    }

    #[tokio::test]
    async fn memory_upsert_overwrites_same_id() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert("REV-000001", vec![0.1, 0.2], meta(1))
            .await
            .expect("first upsert");
        store
            .upsert("REV-000001", vec![0.9, 0.8], meta(2))
            .await
            .expect("second upsert");

        assert_eq!(store.count().await.expect("count"), 1);
        assert_eq!(store.vector("REV-000001").await, Some(vec![0.9, 0.8]));
        let peeked = store.peek(10).await.expect("peek");
        assert_eq!(peeked[0].metadata, meta(2));
    }

    #[tokio::test]
    async fn memory_rejects_wrong_dimension() {
        let store = MemoryVectorStore::new(3);
        let err = store
            .upsert("REV-000001", vec![0.1], Map::new())
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, EmbedError::Dimension { expected: 3, actual: 1 }));
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn memory_peek_respects_limit() {
        let store = MemoryVectorStore::new(1);
        for i in 0..5 {
            store
                .upsert(&format!("REV-{i:06}"), vec![0.0], Map::new())
                .await
                .expect("upsert");
        }
        assert_eq!(store.peek(2).await.expect("peek").len(), 2);
    }
}
