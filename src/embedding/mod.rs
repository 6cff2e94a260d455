//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embeddings` endpoint.
//! - **[`StubEmbedder`]**: returns a fixed-length zero vector; no network. Used offline and in CI.
//! - **`LocalEmbedder`**: runs a model in-process via fastembed
//!   (feature `local-embeddings-fastembed`).
//!
//! Also provides the vector utilities used by the index:
//! - [`l2_normalize`]: scale a vector to unit length (epsilon-guarded)
//! - [`dot`]: plain dot product; equals cosine similarity on unit vectors
//! - [`cosine_similarity`]: similarity between two raw vectors
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in config:
//!
//! ```rust
//! # use rag_chat::config::EmbeddingConfig;
//! # use rag_chat::embedding::create_embedder;
//! let config = EmbeddingConfig { provider: "stub".to_string(), ..Default::default() };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.dims(), 768);
//! ```
//!
//! # Retry Strategy
//!
//! The Ollama provider retries transient errors up to `max_retries` times:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

#[cfg(feature = "local-embeddings-fastembed")]
mod local_fastembed;

#[cfg(feature = "local-embeddings-fastembed")]
pub use local_fastembed::LocalEmbedder;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// Guards normalization against division by zero on an all-zero vector.
pub const NORM_EPSILON: f32 = 1e-10;

/// Turns text into a fixed-length vector.
///
/// This is the substitution point for tests: anything implementing it can
/// stand in for the real embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the expected vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embeddings` with `{model, prompt}` and reads the
/// `embedding` array from the response. Requires Ollama to be running with
/// the model pulled (e.g. `ollama pull nomic-embed-text`).
///
/// A response whose length differs from `embedding.dims` is rejected with
/// [`EmbeddingError::DimensionMismatch`], so `dims` must match the model.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, Attempt> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = EmbeddingError::Status {
                status: status.as_u16(),
                body,
            };
            // Rate limited or server error retries; other client errors are final.
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| Attempt::Retry(e.into()))?;
        parse_ollama_response(&raw, self.dims).map_err(Attempt::Fatal)
    }
}

enum Attempt {
    Retry(EmbeddingError),
    Fatal(EmbeddingError),
}

fn parse_ollama_response(body: &str, dims: usize) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: OllamaEmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
    if parsed.embedding.is_empty() {
        return Err(EmbeddingError::InvalidResponse(
            "empty embedding array".to_string(),
        ));
    }
    if parsed.embedding.len() != dims {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dims,
            actual: parsed.embedding.len(),
        });
    }
    Ok(parsed.embedding)
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 0u32;
        loop {
            match self.embed_once(text).await {
                Ok(v) => return Ok(v),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) if attempt >= self.max_retries => return Err(e),
                Err(Attempt::Retry(e)) => {
                    // Exponential backoff: 1s, 2s, 4s, 8s, ...
                    let delay = Duration::from_secs(1 << attempt.min(5));
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ============ Stub Provider ============

/// Deterministic offline embedder: every text maps to a zero vector of
/// `dims` length.
///
/// Selected with `embedding.provider = "stub"` or `EMBED_FAKE=true`.
pub struct StubEmbedder {
    dims: usize,
}

impl StubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.0; self.dims])
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"stub"` | [`StubEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires feature `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "stub" => Ok(Arc::new(StubEmbedder::new(config.dims))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Vector utilities ============

/// Scale `v` in place to unit L2 norm.
///
/// The denominator is `‖v‖ + ε`, so a zero vector stays zero instead of
/// turning into NaNs.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm + NORM_EPSILON;
    for x in v.iter_mut() {
        *x /= denom;
    }
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
