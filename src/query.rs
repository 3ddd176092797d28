//! Question answering over one document's index.
//!
//! `answer_question` embeds the question with the ingestion embedder,
//! retrieves the top-k chunks and asks the completer to answer from them.
//! Retrieval always returns `min(k, chunks)` results regardless of
//! relevance; judging relevance is left to the language model.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::index::{IndexProvider, VectorIndex};
use crate::llm::{build_prompt, Completer};
use crate::models::Answer;

pub struct QueryEngine {
    indexes: Arc<dyn IndexProvider>,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    top_k: usize,
    open: Mutex<HashMap<String, Arc<dyn VectorIndex>>>,
}

impl QueryEngine {
    pub fn new(
        indexes: Arc<dyn IndexProvider>,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        top_k: usize,
    ) -> Self {
        Self {
            indexes,
            embedder,
            completer,
            top_k,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Open `document_id`, reusing a cached handle when available.
    async fn index(&self, document_id: &str) -> Result<Arc<dyn VectorIndex>> {
        let mut open = self.open.lock().await;
        if let Some(index) = open.get(document_id) {
            return Ok(index.clone());
        }
        let index = self.indexes.open(document_id).await?;
        open.insert(document_id.to_string(), index.clone());
        Ok(index)
    }

    pub async fn answer_question(&self, question: &str, document_id: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        let index = self.index(document_id).await?;
        if index.embedding_model() != self.embedder.model_name() {
            return Err(QaError::EmbeddingProvider(format!(
                "index '{}' was built with '{}' but the configured model is '{}'",
                document_id,
                index.embedding_model(),
                self.embedder.model_name()
            )));
        }

        let query_vec = self.embedder.embed_query(question).await?;
        let chunks = index.search(&query_vec, self.top_k).await?;
        tracing::debug!(
            document = %index.name(),
            retrieved = chunks.len(),
            best = chunks.first().map(|c| c.score),
            "retrieved context"
        );

        let prompt = build_prompt(&chunks, question);
        let answer = self.completer.complete(&prompt).await?;
        if answer.trim().is_empty() {
            return Err(QaError::LanguageModel("model returned an empty answer".to_string()));
        }

        tracing::info!(
            document = %document_id,
            model = self.completer.model_name(),
            "question answered"
        );

        Ok(Answer {
            question: question.to_string(),
            document_id: document_id.to_string(),
            answer,
            chunks,
        })
    }
}
