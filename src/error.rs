//! Error taxonomy for the question-answering pipeline.
//!
//! Every pipeline operation (ingest, query, history selection) returns
//! [`QaError`]. None of these are fatal to the process: the CLI and HTTP
//! layers turn them into a logged error plus a user-visible message.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by ingestion, retrieval and answer synthesis.
#[derive(Debug, Error)]
pub enum QaError {
    /// No vector index exists for the requested document.
    #[error("no index found for document '{0}'")]
    IndexNotFound(String),

    /// An index already exists; indexes are created exactly once.
    #[error("document '{0}' has already been processed")]
    AlreadyIndexed(String),

    /// Another process is currently building the same index.
    #[error("index for document '{0}' is being created by another process")]
    IndexLocked(String),

    /// The file could not be read as a PDF, or yielded no text.
    #[error("malformed document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// The embedding provider failed or returned an unusable response.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The language model failed or returned an unusable response.
    #[error("language model error: {0}")]
    LanguageModel(String),

    /// A provider call exceeded the configured request timeout.
    #[error("{service} request timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("history entry {index} does not exist (history has {len} entries)")]
    HistoryOutOfRange { index: usize, len: usize },

    #[error("invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("index storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl QaError {
    /// Machine-readable kind, used in HTTP error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            QaError::IndexNotFound(_) => "index_not_found",
            QaError::AlreadyIndexed(_) => "already_indexed",
            QaError::IndexLocked(_) => "index_locked",
            QaError::MalformedDocument { .. } => "malformed_document",
            QaError::EmbeddingProvider(_) => "embedding_provider",
            QaError::LanguageModel(_) => "language_model",
            QaError::Timeout { .. } => "timeout",
            QaError::EmptyQuestion => "empty_question",
            QaError::HistoryOutOfRange { .. } => "history_out_of_range",
            QaError::InvalidFileName(_) => "invalid_file_name",
            QaError::Io(_) => "io",
            QaError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, QaError>;
