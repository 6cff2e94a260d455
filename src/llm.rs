//! Language-model backends.
//!
//! [`ChatBackend`] is the one call the chat service makes to a model: take
//! an ordered message list, return the assistant's reply text.
//!
//! - **[`OllamaChat`]**: `POST {url}/api/chat` with `stream: false`;
//!   reachability is checked with `GET {url}/api/tags`.
//! - **[`EchoChat`]**: offline backend that echoes the user, referencing
//!   their previous message when there is one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::models::{Message, Role};

/// How long `/health` waits for a backend to answer a ping.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Provider name as written in `llm.provider`.
    fn provider(&self) -> &str;
    fn model_name(&self) -> &str;
    /// Produce the assistant reply for `messages`.
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
    /// Check that the backend can be reached. In-process backends always can.
    async fn ping(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaChat {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ping(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(PING_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await?;
        let parsed: OllamaChatResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

// ============ Echo ============

/// Replies `You said: <message>`, adding the user's previous message when
/// the prompt contains one. Needs no model.
pub struct EchoChat;

#[async_trait]
impl ChatBackend for EchoChat {
    fn provider(&self) -> &str {
        "echo"
    }

    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut users = messages.iter().rev().filter(|m| m.role == Role::User);
        let current = users
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no user message to answer".to_string()))?;

        Ok(match users.next() {
            Some(prev) => format!(
                "You said: {}\n(Previously you mentioned: '{}')",
                current.content, prev.content
            ),
            None => format!("You said: {}", current.content),
        })
    }
}

/// Create the [`ChatBackend`] named by `config.provider` (`"ollama"` or `"echo"`).
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn ChatBackend>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        "echo" => Ok(Arc::new(EchoChat)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
