//! Persistent vector indexes stored as SQLite files.
//!
//! Layout under the index root:
//!
//! ```text
//! <root>/
//!   <document-id>/index.sqlite        committed index
//!   .staging-<document-id>-<uuid>/    index being built
//!   .<document-id>.lock               held while an index is being built
//! ```
//!
//! A committed directory exists only for documents whose ingestion
//! finished: indexes are written into a hidden staging directory and
//! renamed into place by [`PendingIndex::commit`]. The lock file is created
//! with `create_new`, so two processes cannot build the same index at once.
//! Committed indexes are opened read-only and reject upserts.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::{check_upsert, top_k, validate_name, IndexProvider, VectorIndex};
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{QaError, Result};
use crate::migrate;
use crate::models::{Chunk, RetrievedChunk};

pub const INDEX_FILE: &str = "index.sqlite";

/// Descriptive metadata stored alongside the vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub document_id: String,
    pub embedding_model: String,
    pub dims: usize,
    pub source_file: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl IndexMeta {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("document_id", self.document_id.clone()),
            ("embedding_model", self.embedding_model.clone()),
            ("dims", self.dims.to_string()),
            ("source_file", self.source_file.clone()),
            ("chunk_size", self.chunk_size.to_string()),
            ("chunk_overlap", self.chunk_overlap.to_string()),
            ("created_at", self.created_at.clone()),
        ]
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            map.get(key).cloned().ok_or_else(|| {
                QaError::Storage(sqlx::Error::Protocol(format!(
                    "index metadata is missing '{}'",
                    key
                )))
            })
        };
        let num = |key: &str| -> Result<usize> {
            get(key)?.parse().map_err(|_| {
                QaError::Storage(sqlx::Error::Protocol(format!(
                    "index metadata '{}' is not a number",
                    key
                )))
            })
        };
        Ok(Self {
            document_id: get("document_id")?,
            embedding_model: get("embedding_model")?,
            dims: num("dims")?,
            source_file: get("source_file")?,
            chunk_size: num("chunk_size")?,
            chunk_overlap: num("chunk_overlap")?,
            created_at: get("created_at")?,
        })
    }
}

/// The directory that holds every document's index.
#[derive(Debug, Clone)]
pub struct IndexRoot {
    root: PathBuf,
}

impl IndexRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dir_for(name).exists()
    }

    /// Whether a build of `name` currently holds the creation lock.
    pub fn is_locked(&self, name: &str) -> bool {
        CreationLock::path_for(&self.root, name).exists()
    }

    /// Names of all committed indexes, sorted. Empty if the root is missing.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Start building a new index for `meta.document_id`.
    ///
    /// # Errors
    ///
    /// - [`QaError::AlreadyIndexed`] if a committed index exists.
    /// - [`QaError::IndexLocked`] if another build holds the lock.
    pub async fn create(&self, meta: IndexMeta) -> Result<PendingIndex> {
        let name = meta.document_id.clone();
        validate_name(&name)?;
        std::fs::create_dir_all(&self.root)?;

        if self.exists(&name) {
            return Err(QaError::AlreadyIndexed(name));
        }
        let lock = CreationLock::acquire(&self.root, &name)?;
        // Re-check under the lock: another process may have just committed.
        if self.exists(&name) {
            return Err(QaError::AlreadyIndexed(name));
        }

        let staging = StagingDir::create(
            self.root
                .join(format!(".staging-{}-{}", name, Uuid::new_v4().simple())),
        )?;

        let pool = db::connect(&staging.path.join(INDEX_FILE), true).await?;
        migrate::create_schema(&pool).await?;
        let mut tx = pool.begin().await?;
        for (key, value) in meta.to_pairs() {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(document = %name, staging = %staging.path.display(), "index staging created");

        Ok(PendingIndex {
            index: SqliteIndex {
                pool,
                meta,
                writable: true,
            },
            target: self.dir_for(&name),
            staging,
            _lock: lock,
        })
    }

    /// Open a committed index read-only.
    pub async fn open_index(&self, name: &str) -> Result<SqliteIndex> {
        validate_name(name).map_err(|_| QaError::IndexNotFound(name.to_string()))?;
        let db_path = self.dir_for(name).join(INDEX_FILE);
        if !db_path.is_file() {
            return Err(QaError::IndexNotFound(name.to_string()));
        }

        let pool = db::connect(&db_path, false).await?;
        let rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&pool)
            .await?;
        let map: HashMap<String, String> = rows
            .iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect();

        Ok(SqliteIndex {
            pool,
            meta: IndexMeta::from_map(&map)?,
            writable: false,
        })
    }
}

#[async_trait]
impl IndexProvider for IndexRoot {
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(self.open_index(name).await?))
    }
}

/// One document's index backed by a SQLite file.
pub struct SqliteIndex {
    pool: SqlitePool,
    meta: IndexMeta,
    writable: bool,
}

impl SqliteIndex {
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// All stored chunks in document order.
    pub async fn chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, chunk_index, page, start_char, text, hash FROM chunks ORDER BY chunk_index",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| self.row_to_chunk(row)).collect())
    }

    fn row_to_chunk(&self, row: &sqlx::sqlite::SqliteRow) -> Chunk {
        let page: i64 = row.get("page");
        let start_char: i64 = row.get("start_char");
        Chunk {
            id: row.get("id"),
            document_id: self.meta.document_id.clone(),
            chunk_index: row.get("chunk_index"),
            page: page as u32,
            start_char: start_char as usize,
            text: row.get("text"),
            hash: row.get("hash"),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        &self.meta.document_id
    }

    fn embedding_model(&self) -> &str {
        &self.meta.embedding_model
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if !self.writable {
            return Err(QaError::AlreadyIndexed(self.meta.document_id.clone()));
        }
        check_upsert(chunks, vectors)?;
        if let Some(v) = vectors.first() {
            if v.len() != self.meta.dims {
                return Err(QaError::EmbeddingProvider(format!(
                    "index expects {} dimensions, got {}",
                    self.meta.dims,
                    v.len()
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, chunk_index, page, start_char, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    chunk_index = excluded.chunk_index,
                    page = excluded.page,
                    start_char = excluded.start_char,
                    text = excluded.text,
                    hash = excluded.hash,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.chunk_index)
            .bind(chunk.page as i64)
            .bind(chunk.start_char as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Brute-force cosine over every stored vector.
        let rows = sqlx::query(
            "SELECT id, chunk_index, page, start_char, text, hash, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                RetrievedChunk {
                    chunk: self.row_to_chunk(row),
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(top_k(candidates, k))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

/// An index under construction. Dropping it without calling
/// [`commit`](PendingIndex::commit) discards the staging directory.
pub struct PendingIndex {
    index: SqliteIndex,
    target: PathBuf,
    staging: StagingDir,
    _lock: CreationLock,
}

impl PendingIndex {
    pub fn index(&self) -> &SqliteIndex {
        &self.index
    }

    /// Flush the index to disk and move it into place.
    pub async fn commit(mut self) -> Result<PathBuf> {
        self.index.close().await;

        if self.target.exists() {
            return Err(QaError::AlreadyIndexed(self.index.meta.document_id.clone()));
        }
        std::fs::rename(&self.staging.path, &self.target)?;
        self.staging.keep = true;

        tracing::info!(
            document = %self.index.meta.document_id,
            path = %self.target.display(),
            "index committed"
        );
        Ok(self.target.clone())
    }

    /// Discard the staging output.
    pub async fn abort(self) {
        self.index.close().await;
    }
}

/// Removes the staging directory on drop unless `keep` is set.
struct StagingDir {
    path: PathBuf,
    keep: bool,
}

impl StagingDir {
    fn create(path: PathBuf) -> Result<Self> {
        std::fs::create_dir(&path)?;
        Ok(Self { path, keep: false })
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// Exclusive per-document build lock, released on drop.
struct CreationLock {
    path: PathBuf,
}

impl CreationLock {
    fn path_for(root: &Path, name: &str) -> PathBuf {
        root.join(format!(".{}.lock", name))
    }

    fn acquire(root: &Path, name: &str) -> Result<Self> {
        let path = Self::path_for(root, name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(QaError::IndexLocked(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CreationLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
