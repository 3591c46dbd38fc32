//! # Support KB CLI (`skb`)
//!
//! ```bash
//! skb --config ./config/skb.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `skb init` | Create the SQLite database and run schema migrations |
//! | `skb ingest [FILE]` | Chunk, embed, and store documents |
//! | `skb preview <PATH>` | Print the chunks a file would produce |
//! | `skb sources` | List ingested sources |
//! | `skb show <SOURCE>` | Print the stored chunks of a source |
//! | `skb delete <SOURCE>` | Delete every chunk of a source |
//! | `skb embed pending` | Embed rows stored without a vector |
//! | `skb serve` | Start the admin HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use support_kb::progress::ProgressMode;
use support_kb::{config, embed_cmd, ingest, migrate, preview_cmd, server, show, sources};

/// Support KB CLI: section-aware ingestion for a support knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/skb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "skb",
    about = "Section-aware document ingestion for a customer-support knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/skb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest documents from `[documents].root`.
    ///
    /// Documents that already have chunks are skipped unless `--force` is
    /// given, in which case their rows are deleted and rebuilt.
    Ingest {
        /// Ingest only this document (relative path or file name).
        file: Option<String>,

        /// Delete and re-ingest documents that already have chunks.
        #[arg(long)]
        force: bool,

        /// Show document and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: off, human, or json. Defaults to human when
        /// stderr is a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Chunk a file and print the result without storing it.
    Preview {
        path: PathBuf,

        /// Print the chunk list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List ingested sources with chunk and pending-embedding counts.
    Sources,

    /// Print the stored chunks of a source.
    Show { source: String },

    /// Delete every chunk of a source.
    Delete { source: String },

    /// Embedding management.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the admin HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed stored chunks that have no vector yet.
    Pending {
        /// Maximum number of chunks to embed.
        #[arg(long)]
        limit: Option<usize>,

        /// Only count pending chunks.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            force,
            dry_run,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            ingest::run_ingest(&cfg, file.as_deref(), force, dry_run, reporter.as_ref()).await?;
        }
        Commands::Preview { path, json } => {
            preview_cmd::run_preview(&cfg, &path, json)?;
        }
        Commands::Sources => {
            sources::run_sources(&cfg).await?;
        }
        Commands::Show { source } => {
            show::run_show(&cfg, &source).await?;
        }
        Commands::Delete { source } => {
            sources::run_delete(&cfg, &source).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending { limit, dry_run } => {
                embed_cmd::run_embed_pending(&cfg, limit, dry_run).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
