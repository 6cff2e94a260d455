//! Core data models shared by retrieval, memory, prompt assembly, and chat.

use serde::{Deserialize, Serialize};

/// Speaker of a message.
///
/// Conversation memory only ever stores [`Role::User`] and
/// [`Role::Assistant`]; [`Role::System`] appears in assembled prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(role, content)` pair. Used both for stored conversation turns and
/// for the message list sent to the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Length of the content in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// One stored conversation turn.
pub type Turn = Message;

/// A chunk of a document, the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Display name of the source document (file name, not full path).
    pub source: String,
    pub text: String,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    /// Cosine similarity between the query and the chunk.
    pub score: f32,
}
