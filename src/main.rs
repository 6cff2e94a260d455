//! # rag-chat CLI (`ragchat`)
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat serve` | Index the documents directory and start the HTTP server |
//! | `ragchat reindex` | Build the index once and print a report |
//! | `ragchat search "<query>"` | Print the top-k chunks for a query |
//! | `ragchat chat <user> "<message>"` | Run a single chat turn |
//! | `ragchat eval <file.jsonl>` | Score grounded answers against a question set |
//!
//! Logging is controlled with `RUST_LOG` and goes to stderr.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rag_chat::{commands, config, server};

const DEFAULT_CONFIG: &str = "./config/ragchat.toml";

/// rag-chat: local retrieval-augmented chat over a personal document folder.
#[derive(Parser)]
#[command(name = "ragchat", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When left at the default and the file does not exist, built-in
    /// defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Rebuild the index and print what was indexed or skipped.
    Reindex,

    /// Search the documents directory.
    Search {
        query: String,

        /// Number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Run one chat turn and print the reply.
    Chat {
        user_id: String,
        message: String,

        /// Refuse instead of answering when nothing relevant is retrieved.
        #[arg(long)]
        grounded: bool,
    },

    /// Replay a JSONL question set in grounded mode and score the answers.
    Eval { file: PathBuf },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rag_chat=info,ragchat=info,tower_http=info".into());

    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn load(path: &Path) -> Result<config::Config> {
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        tracing::info!("no config file at {}, using defaults", DEFAULT_CONFIG);
        let mut cfg = config::Config::default();
        cfg.apply_env_overrides(|k| std::env::var(k).ok());
        cfg.validate()?;
        return Ok(cfg);
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json);

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Reindex => commands::run_reindex(&cfg).await?,
        Commands::Search { query, k } => commands::run_search(&cfg, &query, k).await?,
        Commands::Chat {
            user_id,
            message,
            grounded,
        } => commands::run_chat(&cfg, &user_id, &message, grounded).await?,
        Commands::Eval { file } => commands::run_eval(&cfg, &file).await?,
    }

    Ok(())
}
