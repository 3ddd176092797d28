//! Embedding provider abstraction and implementation.
//!
//! Defines the [`Embedder`] trait and [`OpenAIEmbedder`], which calls any
//! OpenAI-compatible `POST /embeddings` endpoint with batching, timeout and
//! retry (see [`crate::http`]).
//!
//! Also provides vector utilities used by the SQLite index:
//! - [`cosine_similarity`] — compute similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`
//!
//! Ingestion and querying must use the same embedder: similarity between
//! vectors from different models is meaningless. Each index records the
//! [`Embedder::model_name`] it was built with.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingSettings, HttpSettings, Settings};
use crate::error::{QaError, Result};
use crate::http::{self, Service};

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_texts(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| QaError::EmbeddingProvider("empty embedding response".to_string()))
    }
}

// ============ OpenAI-compatible Provider ============

/// Embedding provider for the OpenAI embeddings API (or any server that
/// implements the same wire format).
///
/// Texts are sent in batches of `EMBEDDING_BATCH_SIZE`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    http: HttpSettings,
    url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl OpenAIEmbedder {
    /// Create a new provider.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::EmbeddingProvider`] if `OPENAI_API_KEY` is not set.
    pub fn new(settings: &EmbeddingSettings, http: &HttpSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            QaError::EmbeddingProvider("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            client: http::build_client(http, Service::Embedding)?,
            http: http.clone(),
            url: format!("{}/embeddings", settings.api_base.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = http::post_json(
                &self.client,
                &self.http,
                Service::Embedding,
                &self.url,
                &self.api_key,
                &body,
            )
            .await?;

            let vectors = parse_openai_response(&json)?;
            if vectors.len() != batch.len() {
                return Err(QaError::EmbeddingProvider(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            out.extend(vectors);
        }

        tracing::debug!(model = %self.model, count = out.len(), "embedded texts");
        Ok(out)
    }
}

/// Parse the embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and returns them ordered by
/// `data[].index` (falling back to response order when absent).
pub fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            QaError::EmbeddingProvider("invalid response: missing data array".to_string())
        })?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                QaError::EmbeddingProvider("invalid response: missing embedding".to_string())
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the configured embedder.
pub fn create_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(OpenAIEmbedder::new(
        &settings.embedding,
        &settings.http,
    )?))
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use docqa::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
