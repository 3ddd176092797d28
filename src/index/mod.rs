//! Vector index abstraction.
//!
//! A vector index holds the (chunk, embedding) pairs of exactly one
//! document and answers nearest-neighbour queries by cosine similarity.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`VectorIndex`] | upsert and search over one index |
//! | [`IndexProvider`] | open an index by document id |
//! | [`sqlite::IndexRoot`] | persistent indexes, one directory per document |
//! | [`memory::MemoryIndexes`] | in-memory indexes for tests |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{QaError, Result};
use crate::models::{Chunk, RetrievedChunk};

/// A searchable collection of embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The document id this index was built for.
    fn name(&self) -> &str;

    /// The embedding model the stored vectors came from.
    fn embedding_model(&self) -> &str;

    /// Store chunks with their vectors (`vectors[i]` belongs to `chunks[i]`).
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return the `k` chunks most similar to `query`, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of stored chunks.
    async fn len(&self) -> Result<usize>;
}

/// Opens indexes by document id.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// # Errors
    ///
    /// [`QaError::IndexNotFound`] when no index exists for `name`.
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>>;
}

/// Check that `name` can be used as an index directory name.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(QaError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Check `chunks` and `vectors` line up before an upsert.
pub(crate) fn check_upsert(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        return Err(QaError::EmbeddingProvider(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        if vectors.iter().any(|v| v.len() != first.len() || v.is_empty()) {
            return Err(QaError::EmbeddingProvider(
                "embedding vectors have inconsistent dimensions".to_string(),
            ));
        }
    }
    Ok(())
}

/// Sort candidates by score descending (ties by chunk order) and keep `k`.
pub(crate) fn top_k(mut candidates: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    candidates.truncate(k);
    candidates
}
