//! In-process embeddings via fastembed (ONNX Runtime, bundled).
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are made.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    // fastembed's `embed` takes `&mut self`.
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = resolve_model(&config.model)?;
        let embedding = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model_name: config.model.clone(),
            dims,
            model: Arc::new(Mutex::new(embedding)),
        })
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "nomic-embed-text" | "nomic-embed-text-v1.5" => {
            Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768))
        }
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = self.model.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Local("embedding model lock poisoned".to_string()))?;
            let mut out = model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::Local(e.to_string()))?;
            out.pop()
                .ok_or_else(|| EmbeddingError::Local("empty embedding output".to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Local(format!("embedding task failed: {}", e)))?
    }
}
