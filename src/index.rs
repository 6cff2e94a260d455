//! In-memory vector index and the pipeline that builds it.
//!
//! ```text
//! docs dir ──walk──▶ extract ──▶ chunk ──▶ embed ──▶ L2-normalize ──▶ Index
//! ```
//!
//! The index is a row-major matrix of unit-length vectors with parallel
//! `texts` and `sources` columns. Because every row is normalized at build
//! time, ranking a query is a plain dot product against each row.
//!
//! Ingestion is best-effort per file: a file that cannot be read or
//! extracted is recorded as [`FileOutcome::Skipped`] and the build carries
//! on. Embedding failures, on the other hand, abort the build; nothing
//! downstream is valid without a vector.

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::chunk::chunk_with;
use crate::config::ChunkingConfig;
use crate::embedding::{dot, l2_normalize, Embedder};
use crate::error::EmbeddingError;
use crate::extract::{extract_text, DocumentKind};
use crate::models::{Chunk, SearchHit};

/// Immutable snapshot of the indexed corpus.
#[derive(Debug, Clone, Default)]
pub struct Index {
    /// Row-major `len × dims` matrix of unit vectors.
    matrix: Vec<f32>,
    texts: Vec<String>,
    sources: Vec<String>,
    dims: usize,
}

impl Index {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble an index from chunks and their raw embeddings, normalizing
    /// every row. All vectors must share one dimensionality.
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, EmbeddingError> {
        debug_assert_eq!(chunks.len(), vectors.len());
        let Some(dims) = vectors.first().map(Vec::len) else {
            return Ok(Self::empty());
        };
        if dims == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "zero-length embedding".to_string(),
            ));
        }

        let mut matrix = Vec::with_capacity(dims * vectors.len());
        for mut v in vectors {
            if v.len() != dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dims,
                    actual: v.len(),
                });
            }
            l2_normalize(&mut v);
            matrix.extend_from_slice(&v);
        }

        let (texts, sources): (Vec<String>, Vec<String>) =
            chunks.into_iter().map(|c| (c.text, c.source)).unzip();

        Ok(Self {
            matrix,
            texts,
            sources,
            dims,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Vector dimensionality, `0` for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// The normalized vector at `i`.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        Some(&self.matrix[i * self.dims..(i + 1) * self.dims])
    }

    /// Rank every row against `query` and return the best `k`.
    ///
    /// The query is normalized here, so callers pass the raw embedding.
    /// Results are sorted by descending similarity; equal scores keep index
    /// order (lower row first). An empty index yields no hits for any `k`.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, EmbeddingError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .matrix
            .chunks_exact(self.dims)
            .map(|row| dot(row, &q))
            .enumerate()
            .collect();

        // `sort_by` is stable, which gives the lower-index-wins tie break.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                text: self.texts[i].clone(),
                source: self.sources[i].clone(),
                score,
            })
            .collect())
    }
}

// ============ Build report ============

/// What happened to one candidate file during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Indexed { chunks: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub source: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Summary of an index build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub files: Vec<FileReport>,
    pub chunks_indexed: usize,
    pub dims: usize,
}

impl BuildReport {
    pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Skipped { .. }))
    }
}

// ============ Build pipeline ============

/// Walk `dir`, extract and chunk every allowed file, embed each chunk, and
/// assemble a normalized [`Index`].
///
/// A missing directory or a corpus with no chunks yields an empty index.
/// Only embedding failures are returned as errors.
pub async fn build_index(
    dir: &Path,
    embedder: &dyn Embedder,
    chunking: ChunkingConfig,
) -> Result<(Index, BuildReport), EmbeddingError> {
    let dir_owned = dir.to_path_buf();
    let (chunks, files) =
        tokio::task::spawn_blocking(move || collect_chunks(&dir_owned, &chunking))
            .await
            .unwrap_or_else(|e| std::panic::resume_unwind(e.into_panic()));

    let mut vectors = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        vectors.push(embedder.embed(&chunk.text).await?);
    }

    let index = Index::from_embeddings(chunks, vectors)?;
    let report = BuildReport {
        files,
        chunks_indexed: index.len(),
        dims: index.dims(),
    };

    tracing::info!(
        dir = %dir.display(),
        files = report.files.len(),
        skipped = report.skipped().count(),
        chunks = report.chunks_indexed,
        dims = report.dims,
        "index build complete"
    );

    Ok((index, report))
}

/// Blocking half of the build: walk, extract, chunk.
///
/// Every file under `dir` is a candidate, dot-files and dot-directories
/// included. Files are visited in sorted path order so builds are
/// deterministic.
pub fn collect_chunks(dir: &Path, chunking: &ChunkingConfig) -> (Vec<Chunk>, Vec<FileReport>) {
    let mut chunks = Vec::new();
    let mut files = Vec::new();

    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "document directory does not exist");
        return (chunks, files);
    }

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = DocumentKind::from_path(path) else {
            tracing::debug!(path = %path.display(), "ignoring file with disallowed extension");
            continue;
        };
        let source = entry.file_name().to_string_lossy().to_string();

        let outcome = match extract_text(path, kind) {
            Ok(text) => {
                let pieces = chunk_with(&text, chunking);
                let count = pieces.len();
                chunks.extend(pieces.into_iter().map(|text| Chunk {
                    source: source.clone(),
                    text,
                }));
                tracing::debug!(path = %path.display(), chunks = count, "document chunked");
                FileOutcome::Indexed { chunks: count }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping document");
                FileOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };

        files.push(FileReport {
            path: path.to_path_buf(),
            source,
            outcome,
        });
    }

    (chunks, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StubEmbedder;
    use std::fs;
    use tempfile::TempDir;

    fn chunk(source: &str, text: &str) -> Chunk {
        Chunk {
            source: source.to_string(),
            text: text.to_string(),
        }
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_rows_are_unit_length() {
        let index = Index::from_embeddings(
            vec![chunk("a.txt", "a"), chunk("b.txt", "b")],
            vec![vec![3.0, 4.0, 0.0], vec![0.0, -2.0, 0.0]],
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dims(), 3);
        for i in 0..index.len() {
            assert!((norm(index.row(i).unwrap()) - 1.0).abs() < 1e-5);
        }
        assert!(index.row(2).is_none());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = Index::from_embeddings(
            vec![chunk("a", "a"), chunk("b", "b")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_top_k_orders_by_similarity() {
        let index = Index::from_embeddings(
            vec![chunk("x", "east"), chunk("y", "north"), chunk("z", "north-east")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();

        let hits = index.top_k(&[0.0, 5.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "north-east", "east"]);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_top_k_ties_keep_index_order() {
        let index = Index::from_embeddings(
            vec![chunk("a", "first"), chunk("b", "second"), chunk("c", "third")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        let hits = index.top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "second");
    }

    #[test]
    fn test_top_k_larger_than_index() {
        let index =
            Index::from_embeddings(vec![chunk("a", "only")], vec![vec![1.0, 2.0]]).unwrap();
        assert_eq!(index.top_k(&[1.0, 0.0], 10).unwrap().len(), 1);
        assert!(index.top_k(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_never_errors() {
        let index = Index::empty();
        for k in [0, 1, 4, 100] {
            assert!(index.top_k(&[1.0, 2.0, 3.0], k).unwrap().is_empty());
        }
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = Index::from_embeddings(vec![chunk("a", "a")], vec![vec![1.0, 0.0]]).unwrap();
        assert!(index.top_k(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_collect_chunks_filters_and_reports() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("nested/b.md"), "# beta").unwrap();
        fs::write(root.join("blank.txt"), "   \n").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".git/config.txt"), "git notes").unwrap();
        fs::write(root.join(".notes.md"), "dot notes").unwrap();
        fs::write(root.join("broken.pdf"), b"not a pdf").unwrap();

        let (chunks, files) = collect_chunks(root, &ChunkingConfig::default());

        let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["config.txt", ".notes.md", "a.txt", "b.md"]);
        assert_eq!(chunks[3].text, "# beta");

        let outcome_of = |name: &str| {
            files
                .iter()
                .find(|f| f.source == name)
                .map(|f| f.outcome.clone())
        };
        assert_eq!(outcome_of("blank.txt"), Some(FileOutcome::Indexed { chunks: 0 }));
        assert!(matches!(
            outcome_of("broken.pdf"),
            Some(FileOutcome::Skipped { .. })
        ));
        assert_eq!(outcome_of("image.png"), None);
        assert_eq!(outcome_of(".notes.md"), Some(FileOutcome::Indexed { chunks: 1 }));
        assert_eq!(outcome_of("config.txt"), Some(FileOutcome::Indexed { chunks: 1 }));
    }

    #[tokio::test]
    async fn test_build_missing_dir_is_empty() {
        let embedder = StubEmbedder::new(8);
        let (index, report) = build_index(
            Path::new("/nonexistent/docs"),
            &embedder,
            ChunkingConfig::default(),
        )
        .await
        .unwrap();
        assert!(index.is_empty());
        assert_eq!(report.chunks_indexed, 0);
    }

    #[tokio::test]
    async fn test_build_only_disallowed_files_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.docx"), "x").unwrap();
        fs::write(tmp.path().join("b.csv"), "1,2").unwrap();

        let embedder = StubEmbedder::new(8);
        let (index, report) = build_index(tmp.path(), &embedder, ChunkingConfig::default())
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(report.files.is_empty());
        assert!(index.top_k(&[0.0; 8], 4).unwrap().is_empty());
    }
}
