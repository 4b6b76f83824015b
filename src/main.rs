//! # docchat CLI
//!
//! The `docchat` binary runs the document-chat backend: a small HTTP API
//! where users upload PDF/TXT documents, the server extracts and chunks
//! their text, and a chat endpoint answers questions about a document
//! through an external language model.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docchat init --config ./config/docchat.toml
//!
//! # Start the API server
//! docchat serve --config ./config/docchat.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{config, migrate, server};

/// docchat CLI — a document upload and chat backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — upload documents and chat with them through an AI model",
    version,
    long_about = "docchat ingests uploaded PDF and plain-text documents, extracts and chunks \
    their text into SQLite, and serves a chat API that answers questions about a document's \
    content via an external language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docchat.toml`. Database, server, upload,
    /// chunking, and AI provider settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (users,
    /// documents, document_chunks, chat_sessions, chat_messages). This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// docchat API endpoints until terminated.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docchat=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
