//! docqa CLI
//!
//! Main entry point for the docqa command-line tool.
//! Ingests pre-chunked documents into the local vector store and searches it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ClearCommand, IngestCommand, SearchCommand, StatsCommand};
use docqa_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// docqa - local document retrieval for question answering
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Local document retrieval for question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/docqa.yaml)
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the vector store
    #[arg(long, global = true, env = "DOCQA_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Embedding provider (gemini, ollama, trigram, mock)
    #[arg(short, long, global = true, env = "DOCQA_EMBEDDING_PROVIDER")]
    provider: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true, env = "DOCQA_EMBEDDING_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add chunks from JSONL files to the store
    Ingest(IngestCommand),

    /// Find the chunks most relevant to a query
    Search(SearchCommand),

    /// Remove every chunk and the persisted file
    Clear(ClearCommand),

    /// Show store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.storage_dir,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("docqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Storage: {:?}", config.storage_path());
    tracing::debug!("Embedding provider: {}", config.embedding_provider());

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Search(_) => "search",
        Commands::Clear(_) => "clear",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let store = docqa_store::open_from_config(&config).await?;

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&store).await,
        Commands::Search(cmd) => cmd.execute(&store).await,
        Commands::Clear(cmd) => cmd.execute(&store).await,
        Commands::Stats(cmd) => cmd.execute(&store).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
