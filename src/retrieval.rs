//! Retrieval engine: owns the live index and answers similarity queries.
//!
//! The index is held in an [`ArcSwap`]. A reindex builds a complete new
//! [`Index`] off to the side and then swaps the pointer, so a search always
//! ranks against one whole snapshot, old or new. Concurrent reindexes race
//! and the last one to finish wins.
//!
//! No lock is held while talking to the embedding service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{ChunkingConfig, Config};
use crate::embedding::Embedder;
use crate::error::{ChatError, EmbeddingError};
use crate::extract::DocumentKind;
use crate::index::{build_index, BuildReport, Index};
use crate::models::SearchHit;

pub struct RetrievalEngine {
    index: ArcSwap<Index>,
    embedder: Arc<dyn Embedder>,
    docs_dir: PathBuf,
    chunking: ChunkingConfig,
    default_k: usize,
}

impl RetrievalEngine {
    /// Create an engine with an empty index. Call [`reindex`](Self::reindex)
    /// to populate it.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        docs_dir: impl Into<PathBuf>,
        chunking: ChunkingConfig,
        default_k: usize,
    ) -> Self {
        Self {
            index: ArcSwap::from_pointee(Index::empty()),
            embedder,
            docs_dir: docs_dir.into(),
            chunking,
            default_k,
        }
    }

    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            embedder,
            config.docs.dir.clone(),
            config.chunking,
            config.retrieval.top_k,
        )
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// The current index snapshot.
    pub fn snapshot(&self) -> Arc<Index> {
        self.index.load_full()
    }

    pub fn chunk_count(&self) -> usize {
        self.index.load().len()
    }

    /// Rebuild the index from the documents directory and swap it in.
    ///
    /// On failure the previous index stays live.
    pub async fn reindex(&self) -> Result<BuildReport, EmbeddingError> {
        let (index, report) =
            build_index(&self.docs_dir, self.embedder.as_ref(), self.chunking).await?;
        self.index.store(Arc::new(index));
        Ok(report)
    }

    /// Return up to `k` `(chunk_text, source_name)` pairs ranked by cosine
    /// similarity to `query`.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(String, String)>, EmbeddingError> {
        let hits = self.search_scored(query, k).await?;
        Ok(hits.into_iter().map(|h| (h.text, h.source)).collect())
    }

    /// Like [`search`](Self::search) but keeps the similarity scores.
    ///
    /// An empty index returns no hits without calling the embedder.
    pub async fn search_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, EmbeddingError> {
        let index = self.snapshot();
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query).await?;
        let hits = index.top_k(&query_vec, k)?;

        tracing::debug!(k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Store a new document in the corpus and rebuild the index.
    ///
    /// `name` must be a bare file name with an allowed extension.
    pub async fn add_document(&self, name: &str, bytes: &[u8]) -> Result<BuildReport, ChatError> {
        let file_name = validate_document_name(name)?;
        let path = self.docs_dir.join(file_name);

        tokio::fs::create_dir_all(&self.docs_dir)
            .await
            .map_err(|source| ChatError::Io {
                path: self.docs_dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ChatError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "document added");
        Ok(self.reindex().await?)
    }
}

fn validate_document_name(name: &str) -> Result<&str, ChatError> {
    let path = Path::new(name);
    let is_bare = path.file_name().and_then(|n| n.to_str()) == Some(name);
    if name.is_empty() || !is_bare || name.starts_with('.') {
        return Err(ChatError::InvalidDocumentName(name.to_string()));
    }
    if DocumentKind::from_path(path).is_none() {
        return Err(ChatError::UnsupportedFileType(name.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StubEmbedder;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Length-based embedder that can be switched into failure mode.
    struct FlakyEmbedder {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingError::Status {
                    status: 503,
                    body: "down".to_string(),
                });
            }
            Ok(vec![1.0, text.len() as f32])
        }
    }

    fn flaky() -> Arc<FlakyEmbedder> {
        Arc::new(FlakyEmbedder {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_search_empty_index_skips_embedder() {
        let embedder = flaky();
        let engine = RetrievalEngine::new(
            embedder.clone(),
            "/nonexistent",
            ChunkingConfig::default(),
            4,
        );
        assert!(engine.search("anything", 4).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_reindex_keeps_previous_index() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("b.txt"), "beta beta").unwrap();

        let embedder = flaky();
        let engine =
            RetrievalEngine::new(embedder.clone(), tmp.path(), ChunkingConfig::default(), 4);
        engine.reindex().await.unwrap();
        assert_eq!(engine.chunk_count(), 2);

        fs::write(tmp.path().join("c.txt"), "gamma").unwrap();
        embedder.fail.store(true, Ordering::SeqCst);
        assert!(engine.reindex().await.is_err());
        assert_eq!(engine.chunk_count(), 2);

        embedder.fail.store(false, Ordering::SeqCst);
        engine.reindex().await.unwrap();
        assert_eq!(engine.chunk_count(), 3);
    }

    #[tokio::test]
    async fn test_search_returns_min_k_len() {
        let tmp = TempDir::new().unwrap();
        for (name, body) in [("a.txt", "a"), ("b.txt", "bb"), ("c.txt", "ccc")] {
            fs::write(tmp.path().join(name), body).unwrap();
        }
        let engine = RetrievalEngine::new(flaky(), tmp.path(), ChunkingConfig::default(), 4);
        engine.reindex().await.unwrap();

        for k in [1, 2, 3, 10] {
            let hits = engine.search_scored("bb", k).await.unwrap();
            assert_eq!(hits.len(), k.min(3));
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }

        let pairs = engine.search("bb", 1).await.unwrap();
        assert_eq!(pairs, vec![("bb".to_string(), "b.txt".to_string())]);
    }

    #[tokio::test]
    async fn test_add_document_validates_and_reindexes() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        let engine = RetrievalEngine::new(
            Arc::new(StubEmbedder::new(4)),
            &docs,
            ChunkingConfig::default(),
            4,
        );

        let err = engine.add_document("photo.png", b"png").await.unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedFileType(_)));

        let err = engine.add_document("../escape.txt", b"x").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidDocumentName(_)));

        let report = engine
            .add_document("notes.md", b"# Notes\n\nSome notes.")
            .await
            .unwrap();
        assert_eq!(report.chunks_indexed, 1);
        assert_eq!(engine.chunk_count(), 1);
        assert!(docs.join("notes.md").exists());
    }

    #[test]
    fn test_validate_document_name() {
        assert!(validate_document_name("cv.PDF").is_ok());
        assert!(validate_document_name("").is_err());
        assert!(validate_document_name(".hidden.txt").is_err());
        assert!(validate_document_name("a/b.txt").is_err());
    }
}
