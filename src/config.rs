//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) yields a working offline-capable setup
//! pointed at a local Ollama instance.
//!
//! ```toml
//! [docs]
//! dir = "data/docs"
//!
//! [chunking]
//! size = 800
//! overlap = 120
//!
//! [embedding]
//! provider = "ollama"   # ollama | stub | local
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [llm]
//! provider = "ollama"   # ollama | echo
//! model = "llama3.1"
//! ```
//!
//! After parsing, [`load_config`] applies environment overrides
//! (`OLLAMA_URL`, `EMBED_MODEL`, `LLM_MODEL`, `EMBED_FAKE`, `CI`, `HOST`,
//! `PORT`) and validates the result.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub docs: DocsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub memory: MemoryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DocsConfig {
    /// Root of the document corpus. Walked recursively on every reindex.
    pub dir: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/docs"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub size: usize,
    /// Characters shared between consecutive windows. Must be `< size`.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 800,
            overlap: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub url: String,
    pub dims: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            url: default_ollama_url(),
            dims: 768,
            timeout_secs: 30,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            url: default_ollama_url(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// Added after `system_prompt` when a chat runs in grounded mode.
    pub grounded_system_prompt: String,
    /// Returned without calling the model when grounded mode finds no context.
    pub refusal_reply: String,
    /// Returned when the model backend fails.
    pub degraded_reply: String,
    /// Character cap for the assembled prompt.
    pub max_prompt_chars: usize,
    pub redact_pii: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful personal assistant. When a CONTEXT message is \
                present, use it to answer and mention the [source] names you relied on."
                .to_string(),
            grounded_system_prompt: "Answer strictly from the CONTEXT. If the CONTEXT does not \
                contain the answer, say that you don't know."
                .to_string(),
            refusal_reply: "I couldn't find anything in your documents to answer that."
                .to_string(),
            degraded_reply: "Sorry, the language model is unavailable right now. \
                Please try again in a moment."
                .to_string(),
            max_prompt_chars: 12_000,
            redact_pii: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turns kept per user; the oldest is evicted first.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 8 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Read, parse, override from the environment, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Parse config TOML without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

impl Config {
    /// Apply the environment variables the service has always honoured.
    ///
    /// `lookup` is injected so tests do not have to mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.url = url.clone();
            self.llm.url = url;
        }
        if let Some(model) = lookup("EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        let truthy = |key: &str| lookup(key).is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if truthy("EMBED_FAKE") || truthy("CI") {
            self.embedding.provider = "stub".to_string();
        }
        let host = lookup("HOST");
        let port = lookup("PORT");
        if host.is_some() || port.is_some() {
            let (default_host, default_port) = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(h, p)| (h.to_string(), p.to_string()))
                .unwrap_or_else(|| ("127.0.0.1".to_string(), "8000".to_string()));
            self.server.bind = format!(
                "{}:{}",
                host.unwrap_or(default_host),
                port.unwrap_or(default_port)
            );
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            bail!("chunking.size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap,
                self.chunking.size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.memory.max_turns == 0 {
            bail!("memory.max_turns must be >= 1");
        }
        if self.chat.max_prompt_chars == 0 {
            bail!("chat.max_prompt_chars must be >= 1");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }

        match self.embedding.provider.as_str() {
            "ollama" | "stub" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be ollama, stub, or local.",
                other
            ),
        }
        match self.llm.provider.as_str() {
            "ollama" | "echo" => {}
            other => bail!("Unknown llm provider: '{}'. Must be ollama or echo.", other),
        }

        Ok(())
    }
}
