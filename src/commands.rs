//! One-shot CLI commands.
//!
//! Each command builds a fresh [`ChatService`] from config, indexes the
//! documents directory, does its work and prints to stdout. Logs go to
//! stderr, so stdout stays clean for piping.

use std::path::Path;

use anyhow::Result;

use crate::chat::ChatService;
use crate::config::Config;
use crate::eval;
use crate::index::FileOutcome;

async fn indexed_service(config: &Config) -> Result<ChatService> {
    let service = ChatService::from_config(config)?;
    service.reindex().await?;
    Ok(service)
}

pub async fn run_reindex(config: &Config) -> Result<()> {
    let service = ChatService::from_config(config)?;
    let report = service.retrieval().reindex().await?;

    for file in report.skipped() {
        if let FileOutcome::Skipped { reason } = &file.outcome {
            println!("skipped {}: {}", file.path.display(), reason);
        }
    }
    println!(
        "Indexed {} chunks from {} files ({} skipped, dims {}).",
        report.chunks_indexed,
        report.files.len(),
        report.skipped().count(),
        report.dims
    );
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let service = indexed_service(config).await?;
    let retrieval = service.retrieval();
    let hits = retrieval
        .search_scored(query, k.unwrap_or_else(|| retrieval.default_k()))
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.source);
        println!("    excerpt: \"{}\"", excerpt(&hit.text, 200));
        println!();
    }
    Ok(())
}

pub async fn run_chat(config: &Config, user_id: &str, message: &str, grounded: bool) -> Result<()> {
    let service = indexed_service(config).await?;
    let response = service.chat(user_id, message, grounded).await?;

    println!("{}", response.reply);
    if let Some(sources) = response.sources {
        println!();
        println!("sources: {}", sources.join(", "));
    }
    Ok(())
}

pub async fn run_eval(config: &Config, path: &Path) -> Result<()> {
    let cases = eval::load_cases(path)?;
    let service = indexed_service(config).await?;
    let report = eval::run_eval(&service, &cases).await?;

    for case in &report.cases {
        println!("Q: {}", case.question);
        println!("A: {}", case.reply);
        let sources = match case.source_ok {
            Some(ok) => ok.to_string(),
            None => "n/a".to_string(),
        };
        println!(
            "Keywords: {}/{}  Sources OK: {}",
            case.keywords_hit, case.keywords_total, sources
        );
        println!("{}", "-".repeat(60));
    }
    println!("== Summary ==");
    println!("Keyword coverage: {}/{}", report.keyword_coverage, report.total);
    println!(
        "Source correctness: {}/{}",
        report.source_correct, report.source_checked
    );
    Ok(())
}

/// First `max` characters of `text` on one line.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt(" a\nb ", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("ééééé", 2), "éé...");
    }
}
