//! Chat turn service.
//!
//! [`ChatService`] wires the retrieval engine, conversation memory and a
//! [`ChatBackend`] together. One call to [`ChatService::chat`] runs one turn:
//!
//! ```text
//! received ─► retrieve ─► grounded and no hits? ── yes ─► Refused
//!                               │ no
//!                               ▼
//!                        assemble + budget ─► backend ─┬─ ok ──► Replied
//!                                                      └─ err ─► Degraded
//! ```
//!
//! Every outcome appends exactly one user turn and one assistant turn to
//! memory and returns a [`ChatResponse`]. Backend and embedding failures
//! never escape a chat; they become a degraded reply or an empty context.
//! The only error is a message too long to fit in the prompt next to the
//! system instructions, rejected before anything is stored.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{ChatConfig, Config};
use crate::embedding::create_embedder;
use crate::error::ChatError;
use crate::index::BuildReport;
use crate::llm::{create_backend, ChatBackend};
use crate::memory::ConversationMemory;
use crate::models::{Message, Role, SearchHit};
use crate::prompt;
use crate::retrieval::RetrievalEngine;
use crate::safety::{self, SafetyFlag};

/// How a chat turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOutcome {
    /// The backend produced the reply.
    Replied,
    /// The backend failed; the configured fallback reply was used.
    Degraded,
    /// Grounded mode found no context; the backend was not called.
    Refused,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    /// The user's stored history after this turn, oldest first.
    pub history: Vec<Message>,
    /// Distinct source names behind the reply, best match first. `None`
    /// when no context was used.
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<SafetyFlag>,
    pub outcome: TurnOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReindexSummary {
    pub chunks_indexed: usize,
    pub dims: usize,
    pub files_skipped: usize,
}

impl From<&BuildReport> for ReindexSummary {
    fn from(report: &BuildReport) -> Self {
        Self {
            chunks_indexed: report.chunks_indexed,
            dims: report.dims,
            files_skipped: report.skipped().count(),
        }
    }
}

pub struct ChatService {
    retrieval: RetrievalEngine,
    memory: ConversationMemory,
    backend: Arc<dyn ChatBackend>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        retrieval: RetrievalEngine,
        memory: ConversationMemory,
        backend: Arc<dyn ChatBackend>,
        config: ChatConfig,
    ) -> Self {
        Self {
            retrieval,
            memory,
            backend,
            config,
        }
    }

    /// Build the service from config: providers, an empty index, and the
    /// documents directory (created if missing).
    pub fn from_config(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.docs.dir).with_context(|| {
            format!(
                "Failed to create documents directory: {}",
                config.docs.dir.display()
            )
        })?;

        let embedder = create_embedder(&config.embedding)?;
        let backend = create_backend(&config.llm)?;

        Ok(Self::new(
            RetrievalEngine::from_config(config, embedder),
            ConversationMemory::new(config.memory.max_turns),
            backend,
            config.chat.clone(),
        ))
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn backend(&self) -> &dyn ChatBackend {
        self.backend.as_ref()
    }

    /// Run one chat turn for `user_id`.
    ///
    /// Fails with [`ChatError::MessageTooLong`] when the (sanitized) message
    /// would not fit in the prompt budget beside the system instructions.
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        grounded_only: bool,
    ) -> Result<ChatResponse, ChatError> {
        let flags = safety::flags(message);
        let message = if self.config.redact_pii {
            safety::sanitize(message)
        } else {
            message.to_string()
        };

        let max = self.max_message_chars(grounded_only);
        let len = message.chars().count();
        if len > max {
            return Err(ChatError::MessageTooLong { len, max });
        }

        let history = self.memory.get_history(user_id);
        let hits = self.retrieve(&message).await;

        let (reply, outcome) = if grounded_only && hits.is_empty() {
            (self.config.refusal_reply.clone(), TurnOutcome::Refused)
        } else {
            let messages = self.build_prompt(&hits, &history, &message, grounded_only);
            match self.backend.complete(&messages).await {
                Ok(reply) => (reply, TurnOutcome::Replied),
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        model = self.backend.model_name(),
                        error = %e,
                        "chat backend failed, sending degraded reply"
                    );
                    (self.config.degraded_reply.clone(), TurnOutcome::Degraded)
                }
            }
        };

        self.memory.add_turns(
            user_id,
            [Message::user(message), Message::assistant(reply.clone())],
        );

        let sources = match outcome {
            TurnOutcome::Replied => distinct_sources(&hits),
            TurnOutcome::Degraded | TurnOutcome::Refused => None,
        };

        tracing::info!(
            user_id,
            grounded_only,
            hits = hits.len(),
            outcome = ?outcome,
            "chat turn complete"
        );

        Ok(ChatResponse {
            reply,
            history: self.memory.get_history(user_id),
            sources,
            flags,
            outcome,
        })
    }

    /// Characters left for the user message once the system instructions
    /// for this mode are counted.
    pub fn max_message_chars(&self, grounded_only: bool) -> usize {
        let instructions = self
            .system_prompts(grounded_only)
            .iter()
            .map(|s| s.chars().count())
            .sum::<usize>();
        self.config.max_prompt_chars.saturating_sub(instructions)
    }

    /// Rebuild the index from the documents directory.
    pub async fn reindex(&self) -> Result<ReindexSummary, ChatError> {
        let report = self.retrieval.reindex().await?;
        Ok(ReindexSummary::from(&report))
    }

    /// Store a document in the corpus and rebuild the index.
    pub async fn add_document(&self, name: &str, bytes: &[u8]) -> Result<ReindexSummary, ChatError> {
        let report = self.retrieval.add_document(name, bytes).await?;
        Ok(ReindexSummary::from(&report))
    }

    pub fn clear_memory(&self, user_id: &str) {
        self.memory.clear(user_id);
        tracing::debug!(user_id, "memory cleared");
    }

    async fn retrieve(&self, query: &str) -> Vec<SearchHit> {
        match self
            .retrieval
            .search_scored(query, self.retrieval.default_k())
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
        }
    }

    fn build_prompt(
        &self,
        hits: &[SearchHit],
        history: &[Message],
        message: &str,
        grounded_only: bool,
    ) -> Vec<Message> {
        let system = self.system_prompts(grounded_only);
        let blocks = prompt::format_context(hits);
        let messages = prompt::assemble(&system, &blocks, history, message);
        let messages = prompt::budget(messages, self.config.max_prompt_chars);
        if messages.last().map(|m| m.role) != Some(Role::User) {
            tracing::warn!(
                max_chars = self.config.max_prompt_chars,
                "retrieved context left no room for the user message"
            );
        }
        messages
    }

    fn system_prompts(&self, grounded_only: bool) -> Vec<String> {
        let mut system = vec![self.config.system_prompt.clone()];
        if grounded_only {
            system.push(self.config.grounded_system_prompt.clone());
        }
        system
    }
}

/// Source names in rank order with duplicates removed, or `None` for no hits.
fn distinct_sources(hits: &[SearchHit]) -> Option<Vec<String>> {
    if hits.is_empty() {
        return None;
    }
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.source) {
            sources.push(hit.source.clone());
        }
    }
    Some(sources)
}
