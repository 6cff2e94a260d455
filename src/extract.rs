//! Text extraction for the allowed corpus file types.
//!
//! Plain text and markdown are read as (lossy) UTF-8. PDFs are extracted
//! page by page with `pdf-extract` and the pages joined with newlines; a
//! page without a text layer contributes an empty string.

use std::path::Path;

use crate::error::IngestError;

/// File types accepted into the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Classify by extension (case-insensitive). `None` means the file is
    /// not part of the corpus.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentKind::Text),
            "md" => Some(DocumentKind::Markdown),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

/// Extract raw text from a corpus file.
pub fn extract_text(path: &Path, kind: DocumentKind) -> Result<String, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match kind {
        DocumentKind::Text | DocumentKind::Markdown => {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        DocumentKind::Pdf => extract_pdf(path, &bytes),
    }
}

fn extract_pdf(path: &Path, bytes: &[u8]) -> Result<String, IngestError> {
    // pdf-extract panics on some malformed inputs; treat that as a failed file.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| IngestError::Pdf {
            path: path.to_path_buf(),
            message: "extractor panicked".to_string(),
        })?
        .map_err(|e| IngestError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(pages.join("\n"))
}
