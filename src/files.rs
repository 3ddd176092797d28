//! Upload storage and index listing.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{QaError, Result};
use crate::index::sqlite::IndexRoot;
use crate::index::validate_name;

/// Owns the upload directory and knows where indexes live.
#[derive(Debug, Clone)]
pub struct FileManager {
    upload_dir: PathBuf,
    indexes: IndexRoot,
}

impl FileManager {
    pub fn new(upload_dir: impl Into<PathBuf>, index_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            indexes: IndexRoot::new(index_root),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn indexes(&self) -> &IndexRoot {
        &self.indexes
    }

    /// Write an uploaded file into the upload directory.
    ///
    /// Only the final path component of `filename` is used. The bytes are
    /// written to a hidden temporary file and renamed into place, so readers
    /// never see a partially written upload. Returns `Ok(None)` when no file
    /// was provided.
    pub fn save_uploaded_file(
        &self,
        bytes: Option<&[u8]>,
        filename: &str,
    ) -> Result<Option<PathBuf>> {
        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let path = self.get_file_path(filename)?;
        std::fs::create_dir_all(&self.upload_dir)?;
        let partial = self
            .upload_dir
            .join(format!(".upload-{}.part", Uuid::new_v4().simple()));
        if let Err(e) = std::fs::write(&partial, bytes) {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&partial, &path) {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved upload");
        Ok(Some(path))
    }

    /// Delete `path` if it exists.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Document ids that have a committed index, sorted.
    pub fn list_processed_files(&self) -> Result<Vec<String>> {
        self.indexes.list()
    }

    pub fn embedding_exists(&self, document_id: &str) -> bool {
        self.indexes.exists(document_id)
    }

    /// Destination of an upload called `filename`.
    pub fn get_file_path(&self, filename: &str) -> Result<PathBuf> {
        let base = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| QaError::InvalidFileName(filename.to_string()))?;
        validate_name(base)?;
        Ok(self.upload_dir.join(base))
    }
}

/// The document id of a file: its name without extension.
pub fn document_id_for(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| QaError::InvalidFileName(path.display().to_string()))?;
    validate_name(stem)?;
    Ok(stem.to_string())
}
