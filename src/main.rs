//! # Tirtha CLI
//!
//! The `tirtha` binary runs the chat backend and the knowledge-base
//! maintenance commands.
//!
//! ## Usage
//!
//! ```bash
//! tirtha --config ./config/tirtha.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tirtha serve` | Initialize the knowledge base and start the HTTP API |
//! | `tirtha reingest` | Force a full rebuild of all collections from disk |
//! | `tirtha collections` | Show per-collection status and chunk counts |
//! | `tirtha files` | List the knowledge source files |
//! | `tirtha completions <shell>` | Generate shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;

use tirtha::chat::ChatService;
use tirtha::config::{load_config, Config};
use tirtha::embedding;
use tirtha::generation::OpenAiChat;
use tirtha::knowledge::KnowledgeBase;
use tirtha::sqlite_store::SqliteStore;
use tirtha::{db, migrate, server};

/// Tirtha — retrieval-backed support chat for a pilgrimage travel
/// platform.
#[derive(Parser)]
#[command(
    name = "tirtha",
    about = "Retrieval-backed support chat service for a pilgrimage travel platform",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tirtha.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the knowledge base and start the HTTP API.
    ///
    /// Rebuilds the vector index first when the source files have
    /// changed since the last ingest, otherwise attaches to the
    /// persisted index.
    Serve,

    /// Force a full rebuild of all collections from the knowledge
    /// directory, regardless of the stored snapshot hash.
    Reingest,

    /// Show per-collection status and chunk counts.
    Collections,

    /// List the knowledge source files on disk.
    Files,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn build_knowledge_base(config: &Arc<Config>) -> anyhow::Result<Arc<KnowledgeBase>> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let embedder = Arc::from(embedding::create_provider(&config.embedding)?);

    Ok(Arc::new(KnowledgeBase::new(
        config.clone(),
        store,
        embedder,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "tirtha", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let config = Arc::new(load_config(&cli.config)?);

    match cli.command {
        Commands::Serve => {
            let kb = build_knowledge_base(&config).await?;
            kb.init().await?;

            let chat = Arc::new(ChatService::new(
                kb.clone(),
                Box::new(OpenAiChat::new(&config.generation)),
            ));

            server::run_server(&config.server.bind, kb, chat).await?;
        }
        Commands::Reingest => {
            let kb = build_knowledge_base(&config).await?;
            let summary = kb.refresh().await?;
            println!("reingest");
            println!("  collections rebuilt: {}", summary.collections);
            println!("  chunks written: {}", summary.chunks);
            println!("ok");
        }
        Commands::Collections => {
            let kb = build_knowledge_base(&config).await?;
            kb.load_existing().await?;

            println!("{:<12} {:<18} {:<8} CHUNKS", "COLLECTION", "INDEX", "LOADED");
            for info in kb.collections_info().await? {
                println!(
                    "{:<12} {:<18} {:<8} {}",
                    info.category.as_str(),
                    info.name,
                    info.loaded,
                    info.document_count
                );
            }
        }
        Commands::Files => {
            let kb = build_knowledge_base(&config).await?;
            let files = kb.list_files()?;
            if files.is_empty() {
                println!("No knowledge files found.");
            } else {
                println!("{:<40} {:>10} MODIFIED", "NAME", "BYTES");
                for file in files {
                    println!(
                        "{:<40} {:>10} {}",
                        file.name,
                        file.size_bytes,
                        file.modified.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
