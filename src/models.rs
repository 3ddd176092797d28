//! Core data types that flow through ingestion and retrieval.

use serde::Serialize;

/// A contiguous span of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Deterministic UUIDv5 derived from document id and chunk index.
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    /// 1-based page on which the chunk starts.
    pub page: u32,
    /// Char offset of the chunk start in the concatenated document text.
    pub start_char: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A chunk returned by similarity search, with its cosine score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}

/// The result of a successful question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub document_id: String,
    pub answer: String,
    pub chunks: Vec<RetrievedChunk>,
}
