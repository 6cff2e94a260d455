//! Retrieval quality evaluation.
//!
//! Replays a JSONL file of questions through [`ChatService`] in grounded
//! mode and scores each reply:
//!
//! ```json
//! {"question": "What degree?", "keywords": ["engineering"], "must_source": "cv.md"}
//! ```
//!
//! A case passes on keywords when every keyword appears in the reply
//! (case-insensitive), and on sources when `must_source` is among the
//! returned sources.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chat::ChatService;
use crate::error::ChatError;

/// User id the evaluation chats under. Its memory is cleared before every case.
pub const EVAL_USER: &str = "eval";

#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    pub question: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub must_source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub question: String,
    pub reply: String,
    pub sources: Vec<String>,
    pub keywords_hit: usize,
    pub keywords_total: usize,
    /// `None` when the case names no required source.
    pub source_ok: Option<bool>,
}

impl CaseResult {
    pub fn keywords_ok(&self) -> bool {
        self.keywords_hit == self.keywords_total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub total: usize,
    pub keyword_coverage: usize,
    pub source_correct: usize,
    pub source_checked: usize,
    pub cases: Vec<CaseResult>,
}

/// Parse a JSONL case file. Blank lines are ignored.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read eval file: {}", path.display()))?;
    parse_cases(&content).with_context(|| format!("Invalid eval file: {}", path.display()))
}

pub fn parse_cases(content: &str) -> Result<Vec<EvalCase>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

/// Count how many `keywords` occur in `reply`, ignoring case.
pub fn score_keywords(reply: &str, keywords: &[String]) -> usize {
    let reply = reply.to_lowercase();
    keywords
        .iter()
        .filter(|k| reply.contains(&k.to_lowercase()))
        .count()
}

pub async fn run_eval(service: &ChatService, cases: &[EvalCase]) -> Result<EvalReport, ChatError> {
    let mut results = Vec::with_capacity(cases.len());

    for case in cases {
        service.clear_memory(EVAL_USER);
        let response = service.chat(EVAL_USER, &case.question, true).await?;
        let sources = response.sources.unwrap_or_default();

        let result = CaseResult {
            question: case.question.clone(),
            keywords_hit: score_keywords(&response.reply, &case.keywords),
            keywords_total: case.keywords.len(),
            source_ok: case.must_source.as_ref().map(|s| sources.contains(s)),
            reply: response.reply,
            sources,
        };
        tracing::debug!(
            question = %result.question,
            keywords_hit = result.keywords_hit,
            keywords_total = result.keywords_total,
            source_ok = ?result.source_ok,
            "eval case scored"
        );
        results.push(result);
    }
    service.clear_memory(EVAL_USER);

    Ok(EvalReport {
        total: results.len(),
        keyword_coverage: results.iter().filter(|r| r.keywords_ok()).count(),
        source_correct: results.iter().filter(|r| r.source_ok == Some(true)).count(),
        source_checked: results.iter().filter(|r| r.source_ok.is_some()).count(),
        cases: results,
    })
}
