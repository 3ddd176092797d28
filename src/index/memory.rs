//! In-memory [`VectorIndex`] implementation for tests.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity, like the SQLite index.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{check_upsert, top_k, IndexProvider, VectorIndex};
use crate::embedding::cosine_similarity;
use crate::error::{QaError, Result};
use crate::models::{Chunk, RetrievedChunk};

pub struct MemoryIndex {
    name: String,
    model: String,
    rows: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            rows: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_model(&self) -> &str {
        &self.model
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_upsert(chunks, vectors)?;
        let mut rows = self.rows.write().unwrap();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            rows.retain(|(c, _)| c.id != chunk.id);
            rows.push((chunk.clone(), vector.clone()));
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = self.rows.read().unwrap();
        let candidates = rows
            .iter()
            .map(|(chunk, vector)| RetrievedChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();
        Ok(top_k(candidates, k))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.rows.read().unwrap().len())
    }
}

/// A set of named in-memory indexes.
#[derive(Default)]
pub struct MemoryIndexes {
    indexes: RwLock<HashMap<String, Arc<MemoryIndex>>>,
}

impl MemoryIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, index: MemoryIndex) -> Arc<MemoryIndex> {
        let index = Arc::new(index);
        self.indexes
            .write()
            .unwrap()
            .insert(index.name.clone(), index.clone());
        index
    }
}

#[async_trait]
impl IndexProvider for MemoryIndexes {
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>> {
        let indexes = self.indexes.read().unwrap();
        match indexes.get(name) {
            Some(index) => Ok(index.clone()),
            None => Err(QaError::IndexNotFound(name.to_string())),
        }
    }
}
