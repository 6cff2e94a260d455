//! Deterministic doubles shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rag_chat::chat::ChatService;
use rag_chat::config::{ChatConfig, ChunkingConfig};
use rag_chat::embedding::Embedder;
use rag_chat::error::{EmbeddingError, LlmError};
use rag_chat::llm::ChatBackend;
use rag_chat::memory::ConversationMemory;
use rag_chat::models::Message;
use rag_chat::retrieval::RetrievalEngine;

/// Bag-of-words embedder over a fixed vocabulary: one dimension per
/// vocabulary word, counting its occurrences. Words outside the vocabulary
/// are ignored, so unrelated texts are orthogonal.
pub struct KeywordEmbedder {
    vocab: Vec<&'static str>,
    calls: AtomicUsize,
}

pub const VOCAB: &[&str] = &[
    "degree", "engineering", "computer", "systems", "student", "hiking", "chess", "weekends",
    "rust", "python", "cooking", "pasta",
];

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            vocab: VOCAB.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> usize {
        self.vocab.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0; self.vocab.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some(i) = self.vocab.iter().position(|v| *v == word) {
                v[i] += 1.0;
            }
        }
        Ok(v)
    }
}

/// Chat backend that records every prompt and answers with a fixed reply,
/// or fails (completions and pings) when built with
/// [`RecordingBackend::failing`].
pub struct RecordingBackend {
    reply: Option<String>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl RecordingBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for RecordingBackend {
    fn provider(&self) -> &str {
        "recording"
    }

    fn model_name(&self) -> &str {
        "recording"
    }

    async fn ping(&self) -> Result<(), LlmError> {
        match self.reply {
            Some(_) => Ok(()),
            None => Err(LlmError::Status {
                status: 503,
                body: "model unavailable".to_string(),
            }),
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(LlmError::Status {
                status: 503,
                body: "model unavailable".to_string(),
            }),
        }
    }
}

pub fn write_doc(dir: &Path, name: &str, body: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), body).unwrap();
}

/// Service over `docs` with the keyword embedder, default chat settings and
/// top-k 4. The index starts empty.
pub fn service(
    docs: &Path,
    embedder: Arc<KeywordEmbedder>,
    backend: Arc<RecordingBackend>,
) -> ChatService {
    let retrieval = RetrievalEngine::new(embedder, docs, ChunkingConfig::default(), 4);
    ChatService::new(
        retrieval,
        ConversationMemory::new(8),
        backend,
        ChatConfig::default(),
    )
}
