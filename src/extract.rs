//! PDF text extraction.
//!
//! Produces one string per page, in page order. `pdf-extract` can panic on
//! some malformed inputs, so extraction runs under `catch_unwind` and any
//! panic is reported as [`QaError::MalformedDocument`].

use std::path::Path;

use crate::error::{QaError, Result};

/// Page separator used when concatenating page texts.
pub const PAGE_SEPARATOR: &str = "\n";

/// Extracted text of a whole document.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Page texts joined with [`PAGE_SEPARATOR`].
    pub text: String,
    /// Char offset at which each page starts in `text`.
    pub page_starts: Vec<usize>,
}

impl ExtractedText {
    pub fn page_count(&self) -> usize {
        self.page_starts.len()
    }
}

/// Extract the text of every page of the PDF at `path`.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let malformed = |reason: String| QaError::MalformedDocument {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(malformed("file does not exist".to_string()));
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(malformed(e.to_string())),
        Err(_) => Err(malformed("PDF parser panicked".to_string())),
    }
}

/// Concatenate page texts, recording where each page starts.
pub fn join_pages(pages: &[String]) -> ExtractedText {
    let mut text = String::new();
    let mut page_starts = Vec::with_capacity(pages.len());
    let mut offset = 0usize;

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str(PAGE_SEPARATOR);
            offset += PAGE_SEPARATOR.chars().count();
        }
        page_starts.push(offset);
        text.push_str(page);
        offset += page.chars().count();
    }

    ExtractedText { text, page_starts }
}

/// Extract and concatenate, failing when the document has no usable text.
pub fn extract_document(path: &Path) -> Result<ExtractedText> {
    let pages = extract_pages(path)?;
    let joined = join_pages(&pages);
    if joined.text.trim().is_empty() {
        return Err(QaError::MalformedDocument {
            path: path.to_path_buf(),
            reason: "no extractable text".to_string(),
        });
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, QaError::MalformedDocument { .. }));
    }

    #[test]
    fn missing_file_returns_error() {
        let err = extract_pages(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, QaError::MalformedDocument { .. }));
    }

    #[test]
    fn join_records_page_offsets() {
        let pages = vec!["first".to_string(), "sécond".to_string(), "third".to_string()];
        let joined = join_pages(&pages);
        assert_eq!(joined.text, "first\nsécond\nthird");
        assert_eq!(joined.page_starts, vec![0, 6, 13]);
        assert_eq!(joined.page_count(), 3);
    }

    #[test]
    fn join_of_no_pages_is_empty() {
        let joined = join_pages(&[]);
        assert_eq!(joined.text, "");
        assert_eq!(joined.page_count(), 0);
    }
}
