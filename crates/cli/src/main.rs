//! manualqa CLI
//!
//! Answers questions about an ingested planning manual, with citations.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, ClassifyCommand, CleanCommand, IngestCommand, StatsCommand};
use manualqa_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Question answering over an ingested manual
#[derive(Parser, Debug)]
#[command(name = "manualqa")]
#[command(about = "Answer questions about an ingested manual, with page citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MANUALQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MANUALQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Primary provider entry from the config file
    #[arg(short, long, global = true, env = "MANUALQA_PROVIDER")]
    provider: Option<String>,

    /// Primary model identifier
    #[arg(short, long, global = true, env = "MANUALQA_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a manual into a knowledge base
    Ingest(IngestCommand),

    /// Ask one question
    Ask(AskCommand),

    /// Interactive question loop with conversation memory
    Chat(ChatCommand),

    /// Show how a query would be routed
    Classify(ClassifyCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Remove everything from a knowledge base
    Clean(CleanCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "ingest",
            Self::Ask(_) => "ask",
            Self::Chat(_) => "chat",
            Self::Classify(_) => "classify",
            Self::Stats(_) => "stats",
            Self::Clean(_) => "clean",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()
        .context("Failed to load configuration")?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("manualqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_data_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Classify(cmd) => cmd.execute(),
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Clean(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
