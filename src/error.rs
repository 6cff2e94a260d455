//! Error taxonomy for the retrieval and chat pipeline.
//!
//! Each enum maps to one failure policy:
//!
//! | Error | Policy |
//! |-------|--------|
//! | [`IngestError`] | recorded in the build report, the file is skipped |
//! | [`EmbeddingError`] | propagated to whoever asked for the vector |
//! | [`LlmError`] | converted into a degraded reply at the chat boundary |
//! | [`ChatError`] | returned to the caller (bad input or a failed reindex) |
//!
//! An empty index and an unknown user are not errors anywhere in the crate.

use std::path::PathBuf;

use thiserror::Error;

/// A single document could not be read or its text extracted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// The embedding service failed, timed out, or answered with something unusable.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("local embedding failed: {0}")]
    Local(String),
}

/// The language-model backend failed, timed out, or answered with something unusable.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("chat backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by [`ChatService`](crate::chat::ChatService) operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is {len} characters; at most {max} fit in the prompt")]
    MessageTooLong { len: usize, max: usize },

    #[error("unsupported file type: {0} (allowed: .txt, .md, .pdf)")]
    UnsupportedFileType(String),

    #[error("invalid document name: {0:?}")]
    InvalidDocumentName(String),

    #[error("failed to write document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
