//! # rag-chat
//!
//! A local retrieval-augmented chat service over a personal document folder.
//!
//! Documents (`.txt`, `.md`, `.pdf`) are chunked, embedded and held in an
//! in-memory index. Each chat turn retrieves the closest chunks, combines
//! them with the user's recent history into a size-capped prompt, and asks
//! a local language model for the reply.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │   docs/  │──▶│ Chunk+Embed │──▶│  Index (RAM)  │
//! │ txt/md/pdf│   │             │   │  ArcSwap      │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │ top-k
//!      ┌──────────┐   ┌──────────┐   ┌────▼─────┐   ┌─────────┐
//!      │  Memory  │──▶│  Prompt  │◀──│   Chat   │──▶│   LLM   │
//!      │ per user │   │  budget  │   │ service  │   │ backend │
//!      └──────────┘   └──────────┘   └────┬─────┘   └─────────┘
//!                                         │
//!                               ┌─────────┴────────┐
//!                               ▼                  ▼
//!                          ┌─────────┐        ┌─────────┐
//!                          │   CLI   │        │  HTTP   │
//!                          └─────────┘        └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragchat reindex                         # index ./data/docs
//! ragchat search "what degree"            # inspect retrieval
//! ragchat chat kart "What degree do I study?" --grounded
//! ragchat serve                           # HTTP API on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Messages, chunks, search hits |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Text extraction for txt/md/pdf |
//! | [`chunk`] | Sliding-window chunking |
//! | [`embedding`] | Embedding providers and vector math |
//! | [`index`] | In-memory index and index builder |
//! | [`retrieval`] | Atomically swapped index and similarity search |
//! | [`memory`] | Bounded per-user conversation memory |
//! | [`prompt`] | Prompt assembly and character budgeting |
//! | [`safety`] | PII redaction and content flags |
//! | [`llm`] | Chat model backends |
//! | [`chat`] | Chat turn service |
//! | [`eval`] | Grounded-answer evaluation |
//! | [`commands`] | CLI command runners |
//! | [`server`] | HTTP server |

pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod extract;
pub mod index;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod safety;
pub mod server;
