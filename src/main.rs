//! # Article QA CLI (`aqa`)
//!
//! The `aqa` binary is the primary interface for Article QA. It provides
//! commands for database initialization, article sync, embedding
//! management, asking questions, browsing past answers, and starting the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! aqa --config ./config/aqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aqa init` | Create the SQLite database and run schema migrations |
//! | `aqa sync` | Fetch new articles from the configured publication |
//! | `aqa embed pending` | Chunk and embed entries that have no embedding |
//! | `aqa embed rebuild` | Clear and regenerate all embeddings |
//! | `aqa ask "<question>"` | Answer a question from the corpus |
//! | `aqa history` | List recorded questions |
//! | `aqa history show <id>` | Print one recorded answer as JSON |
//! | `aqa serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use article_qa::{ask, config, embed_cmd, history, ingest, logging, migrate, server};

/// Article QA: retrieval-augmented answers over a corpus of articles.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/aqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "aqa",
    about = "Article QA: retrieval-augmented question answering over a corpus of articles",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/aqa.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `queries` table.
    /// Running it multiple times is safe.
    Init,

    /// Fetch articles that are not in the corpus yet.
    Sync,

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Answer a question from the corpus.
    Ask {
        /// The question to answer.
        question: String,

        /// Instructions replacing the configured ones for this question.
        #[arg(long)]
        instructions: Option<String>,

        /// Do not record this answer in the query log.
        #[arg(long)]
        no_persist: bool,
    },

    /// List recorded questions, newest first.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,

        /// Maximum number of entries to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Chunk and embed entries that have no embedding.
    Pending,

    /// Clear all embeddings and regenerate them.
    ///
    /// Useful when switching embedding models.
    Rebuild,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print one recorded answer, with its contexts and parameters.
    Show {
        /// Record id as printed by `aqa history` or `aqa ask`.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync => {
            ingest::run_sync(&cfg).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending => {
                embed_cmd::run_embed_pending(&cfg).await?;
            }
            EmbedAction::Rebuild => {
                embed_cmd::run_embed_rebuild(&cfg).await?;
            }
        },
        Commands::Ask {
            question,
            instructions,
            no_persist,
        } => {
            ask::run_ask(&cfg, &question, instructions.as_deref(), no_persist).await?;
        }
        Commands::History { action, limit } => match action {
            Some(HistoryAction::Show { id }) => {
                history::run_history_show(&cfg, &id).await?;
            }
            None => {
                history::run_history(&cfg, limit).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
