#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use docqa::config::Settings;
use docqa::embedding::Embedder;
use docqa::error::{QaError, Result};
use docqa::llm::Completer;

pub const PAGE_TEXTS: [&str; 3] = [
    "The capital of France is Paris.",
    "Rust is a systems programming language.",
    "The ocean is deep and blue.",
];

/// Build a small valid PDF with one line of Helvetica text per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3 + 2 * n;
    let mut offsets = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    for (i, text) in pages.iter().enumerate() {
        let page_id = 3 + 2 * i;
        let content_id = page_id + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >> endobj\n",
                page_id, content_id, font_id
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
            font_id
        )
        .as_bytes(),
    );

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Settings rooted in `root`, with the given chunking.
pub fn settings_in(root: &Path, chunk_size: usize, chunk_overlap: usize) -> Settings {
    let vars: HashMap<&str, String> = HashMap::from([
        ("LLM_MODEL", "test-llm".to_string()),
        ("MAX_TOKENS", "256".to_string()),
        ("TEMPERATURE", "0".to_string()),
        ("CHUNK_SIZE", chunk_size.to_string()),
        ("CHUNK_OVERLAP", chunk_overlap.to_string()),
        ("EMBEDDING_MODEL", "letters".to_string()),
        ("UPLOAD_DIR", root.join("uploads").display().to_string()),
        ("CHROMA_DB_DIR", root.join("chroma_db").display().to_string()),
        ("LOG_FILE", root.join("app.log").display().to_string()),
    ]);
    let env = |k: &str| vars.get(k).cloned();
    Settings::resolve(&env, None).unwrap()
}

/// Letter-frequency embedder; deterministic and offline.
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 27];
                v[26] = 1.0;
                for c in t.to_ascii_lowercase().bytes() {
                    if c.is_ascii_lowercase() {
                        v[(c - b'a') as usize] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

/// Answers "Paris" when the prompt mentions Paris, otherwise says it
/// does not know. Records every prompt.
#[derive(Default)]
pub struct EchoCompleter {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Completer for EchoCompleter {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Paris") {
            Ok("Paris".to_string())
        } else {
            Ok("I don't know.".to_string())
        }
    }
}

/// Always fails like an unavailable provider.
pub struct DownCompleter;

#[async_trait]
impl Completer for DownCompleter {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(QaError::LanguageModel("API error 503: unavailable".to_string()))
    }
}
