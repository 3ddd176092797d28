//! Settings loading.
//!
//! Settings are resolved once at start-up from three layers, highest
//! precedence first:
//!
//! 1. process environment (after `.env` has been loaded by `dotenvy`),
//! 2. an optional TOML file whose keys are the lower-cased variable names,
//! 3. built-in defaults.
//!
//! The resulting [`Settings`] value is immutable and is handed to every
//! component as an `Arc<Settings>`.
//!
//! ```toml
//! llm_model = "llama3-70b-8192"
//! max_tokens = 1024
//! temperature = 0.2
//! chunk_size = 1000
//! chunk_overlap = 100
//! ```

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

#[derive(Clone)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub http: HttpSettings,
    pub paths: PathSettings,
    pub server: ServerSettings,
}

#[derive(Clone)]
pub struct EmbeddingSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub batch_size: usize,
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub upload_dir: PathBuf,
    pub index_root: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn redact(key: &Option<String>) -> &'static str {
    match key {
        Some(_) => "<set>",
        None => "<unset>",
    }
}

impl fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("embedding", &self.embedding)
            .field("llm", &self.llm)
            .field("chunking", &self.chunking)
            .field("retrieval", &self.retrieval)
            .field("http", &self.http)
            .field("paths", &self.paths)
            .field("server", &self.server)
            .finish()
    }
}

/// Load settings from `.env`, an optional TOML file and the environment.
pub fn load_settings(config_file: Option<&Path>) -> Result<Settings> {
    // A missing .env is fine; a malformed one is not.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("Failed to load .env file"),
    }

    let table = match config_file {
        Some(path) => Some(read_config_file(path)?),
        None => None,
    };

    let env = |key: &str| std::env::var(key).ok();
    Settings::resolve(&env, table.as_ref())
}

fn read_config_file(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Key lookup across the environment and the config file.
struct Layers<'a> {
    env: &'a dyn Fn(&str) -> Option<String>,
    file: Option<&'a toml::Table>,
}

impl Layers<'_> {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = (self.env)(key).filter(|v| !v.trim().is_empty()) {
            return Some(v.trim().to_string());
        }
        let value = self.file?.get(&key.to_ascii_lowercase())?;
        Some(match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn required<T: FromStr>(&self, key: &str) -> Result<T>
    where
        T::Err: fmt::Display,
    {
        let raw = self
            .get(key)
            .with_context(|| format!("{} must be set", key))?;
        raw.parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    }

    fn or_default<T: FromStr>(&self, key: &str, default: T) -> Result<T>
    where
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
            None => Ok(default),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

impl Settings {
    /// Resolve settings from an environment lookup and an optional parsed
    /// config file, then validate them.
    pub fn resolve(
        env: &dyn Fn(&str) -> Option<String>,
        file: Option<&toml::Table>,
    ) -> Result<Settings> {
        let layers = Layers { env, file };

        let settings = Settings {
            embedding: EmbeddingSettings {
                api_key: layers.get("OPENAI_API_KEY"),
                api_base: layers.string_or("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE),
                model: layers.string_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
                batch_size: layers.or_default("EMBEDDING_BATCH_SIZE", 64)?,
            },
            llm: LlmSettings {
                api_key: layers.get("GROQ_API_KEY"),
                api_base: layers.string_or("GROQ_API_BASE", DEFAULT_GROQ_API_BASE),
                model: layers.required("LLM_MODEL")?,
                max_tokens: layers.required("MAX_TOKENS")?,
                temperature: layers.required("TEMPERATURE")?,
            },
            chunking: ChunkingSettings {
                chunk_size: layers.required("CHUNK_SIZE")?,
                chunk_overlap: layers.required("CHUNK_OVERLAP")?,
            },
            retrieval: RetrievalSettings {
                top_k: layers.or_default("TOP_K", 4)?,
            },
            http: HttpSettings {
                timeout_secs: layers.or_default("REQUEST_TIMEOUT_SECS", 60)?,
                max_retries: layers.or_default("MAX_RETRIES", 3)?,
            },
            paths: PathSettings {
                upload_dir: PathBuf::from(layers.string_or("UPLOAD_DIR", "./uploads")),
                index_root: PathBuf::from(layers.string_or("CHROMA_DB_DIR", "./chroma_db")),
                log_file: PathBuf::from(layers.string_or("LOG_FILE", "./app.log")),
            },
            server: ServerSettings {
                host: layers.string_or("HOST", "127.0.0.1"),
                port: layers.or_default("PORT", 8501)?,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("CHUNK_SIZE must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("TOP_K must be >= 1");
        }
        if self.llm.max_tokens == 0 {
            bail!("MAX_TOKENS must be >= 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("TEMPERATURE must be in [0.0, 2.0]");
        }
        if self.llm.model.is_empty() {
            bail!("LLM_MODEL must not be empty");
        }
        if self.embedding.batch_size == 0 {
            bail!("EMBEDDING_BATCH_SIZE must be >= 1");
        }
        if self.http.timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be >= 1");
        }
        Ok(())
    }
}
