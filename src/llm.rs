//! Answer synthesis with a hosted chat model.
//!
//! [`Completer`] is the narrow seam the query component talks to;
//! [`ChatCompleter`] implements it against an OpenAI-compatible
//! `POST /chat/completions` endpoint (Groq by default).
//!
//! Retrieved chunks are "stuffed" into a single prompt by
//! [`build_prompt`]: every chunk becomes part of one context block that is
//! followed by the question.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{HttpSettings, LlmSettings, Settings};
use crate::error::{QaError, Result};
use crate::http::{self, Service};
use crate::models::RetrievedChunk;

/// Maps a prompt to generated text.
#[async_trait]
pub trait Completer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Assemble the question-answering prompt from retrieved context.
pub fn build_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n\
         {}\n\n\
         Question: {}\n\
         Helpful Answer:",
        context, question
    )
}

/// Chat-completions client with fixed generation parameters.
pub struct ChatCompleter {
    client: reqwest::Client,
    http: HttpSettings,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatCompleter {
    /// # Errors
    ///
    /// Returns [`QaError::LanguageModel`] if `GROQ_API_KEY` is not set.
    pub fn new(settings: &LlmSettings, http: &HttpSettings) -> Result<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            QaError::LanguageModel("GROQ_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            client: http::build_client(http, Service::Completion)?,
            http: http.clone(),
            url: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl Completer for ChatCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let json = http::post_json(
            &self.client,
            &self.http,
            Service::Completion,
            &self.url,
            &self.api_key,
            &body,
        )
        .await?;

        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            QaError::LanguageModel("invalid response: missing choices[0].message.content".to_string())
        })
}

/// Create the configured completer.
pub fn create_completer(settings: &Settings) -> Result<Arc<dyn Completer>> {
    Ok(Arc::new(ChatCompleter::new(&settings.llm, &settings.http)?))
}
