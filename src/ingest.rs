//! Ingestion pipeline orchestration.
//!
//! Coordinates the one-shot flow for a single PDF: extraction → chunking →
//! embedding → index build → commit. Each document is ingested exactly
//! once; a second attempt for the same document id is rejected.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::chunk::chunk_text;
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::extract;
use crate::files::{document_id_for, FileManager};
use crate::index::sqlite::IndexMeta;
use crate::index::VectorIndex;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub pages: usize,
    pub chunks: usize,
    pub dims: usize,
}

pub struct Ingestor {
    settings: Arc<Settings>,
    files: FileManager,
    embedder: Arc<dyn Embedder>,
}

impl Ingestor {
    pub fn new(settings: Arc<Settings>, files: FileManager, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            settings,
            files,
            embedder,
        }
    }

    pub fn files(&self) -> &FileManager {
        &self.files
    }

    /// Build the vector index for the PDF at `path`.
    ///
    /// The index is named after the file stem and only becomes visible
    /// once every chunk has been embedded and written.
    pub async fn process_document(&self, path: &Path) -> Result<IngestReport> {
        let document_id = document_id_for(path)?;
        if self.files.embedding_exists(&document_id) {
            return Err(QaError::AlreadyIndexed(document_id));
        }

        tracing::info!(document = %document_id, path = %path.display(), "processing PDF started");

        let extracted = extract::extract_document(path)?;
        let chunking = &self.settings.chunking;
        let chunks = chunk_text(
            &document_id,
            &extracted.text,
            &extracted.page_starts,
            chunking.chunk_size,
            chunking.chunk_overlap,
        );
        tracing::info!(
            document = %document_id,
            pages = extracted.page_count(),
            chunks = chunks.len(),
            "document chunked"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 {
            return Err(QaError::EmbeddingProvider(
                "provider returned empty vectors".to_string(),
            ));
        }

        let meta = IndexMeta {
            document_id: document_id.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            dims,
            source_file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let pending = self.files.indexes().create(meta).await?;
        if let Err(e) = pending.index().upsert(&chunks, &vectors).await {
            pending.abort().await;
            return Err(e);
        }
        pending.commit().await?;

        let report = IngestReport {
            document_id,
            pages: extracted.page_count(),
            chunks: chunks.len(),
            dims,
        };
        tracing::info!(?report, "processing PDF finished");
        Ok(report)
    }

    /// [`process_document`](Self::process_document) with errors logged and
    /// reduced to `false`.
    pub async fn process_document_logged(&self, path: &Path) -> bool {
        match self.process_document(path).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(path = %path.display(), kind = e.kind(), error = ?e, "error processing PDF");
                false
            }
        }
    }

    /// Save an uploaded PDF and ingest it, removing the upload on failure.
    ///
    /// Rejected before anything is written when the document is already
    /// indexed or another build of it holds the lock. The upload is kept
    /// when a concurrent build wins the race.
    pub async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        let document_id = document_id_for(Path::new(filename))?;
        if self.files.embedding_exists(&document_id) {
            tracing::warn!(document = %document_id, "upload already processed");
            return Err(QaError::AlreadyIndexed(document_id));
        }
        if self.files.indexes().is_locked(&document_id) {
            tracing::warn!(document = %document_id, "upload is being processed elsewhere");
            return Err(QaError::IndexLocked(document_id));
        }

        let path = match self.files.save_uploaded_file(Some(bytes), filename)? {
            Some(path) => path,
            None => return Err(QaError::InvalidFileName(filename.to_string())),
        };

        match self.process_document(&path).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(path = %path.display(), kind = e.kind(), error = ?e, "error processing PDF");
                // Another build owns this document and its upload.
                let owned_elsewhere =
                    matches!(e, QaError::AlreadyIndexed(_) | QaError::IndexLocked(_));
                if !owned_elsewhere {
                    if let Err(cleanup) = self.files.remove_file(&path) {
                        tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove upload");
                    }
                }
                Err(e)
            }
        }
    }
}
