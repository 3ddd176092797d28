//! Per-session question/answer history.

use serde::Serialize;

use crate::error::{QaError, Result};
use crate::models::{Answer, RetrievedChunk};
use crate::query::QueryEngine;

const LABEL_CHARS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub document_id: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl HistoryEntry {
    /// Short label for history listings.
    pub fn label(&self) -> String {
        let head: String = self.question.chars().take(LABEL_CHARS).collect();
        format!("{}...", head)
    }
}

impl From<Answer> for HistoryEntry {
    fn from(answer: Answer) -> Self {
        Self {
            question: answer.question,
            answer: answer.answer,
            document_id: answer.document_id,
            chunks: answer.chunks,
        }
    }
}

/// History of answered questions plus an optional selection.
///
/// Only [`Session::ask`] appends; entries are never modified afterwards.
#[derive(Debug, Default)]
pub struct Session {
    history: Vec<HistoryEntry>,
    selected: Option<usize>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `question` against `document_id` and record it.
    ///
    /// The selection is cleared first so the new answer is displayed. On
    /// failure the history is left untouched.
    pub async fn ask(
        &mut self,
        engine: &QueryEngine,
        document_id: &str,
        question: &str,
    ) -> Result<&HistoryEntry> {
        self.selected = None;
        let answer = engine.answer_question(question, document_id).await?;
        self.history.push(answer.into());
        let idx = self.history.len() - 1;
        Ok(&self.history[idx])
    }

    pub fn select(&mut self, index: usize) -> Result<&HistoryEntry> {
        if index >= self.history.len() {
            return Err(QaError::HistoryOutOfRange {
                index,
                len: self.history.len(),
            });
        }
        self.selected = Some(index);
        Ok(&self.history[index])
    }

    /// The selected entry, or the most recent one.
    pub fn displayed(&self) -> Option<&HistoryEntry> {
        match self.selected {
            Some(i) => self.history.get(i),
            None => self.history.last(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
