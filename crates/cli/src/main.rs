//! Veracity CLI
//!
//! Main entry point for the `veracity` command-line tool: self-correcting
//! question answering over local documents.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, KnowledgeCommand};
use std::path::PathBuf;
use veracity_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppError, AppResult,
};

/// Veracity - answers from your documents, fact-checked before you see them
#[derive(Parser, Debug)]
#[command(name = "veracity")]
#[command(about = "Self-correcting question answering over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "VERACITY_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VERACITY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (groq, openai, ollama)
    #[arg(short, long, global = true, env = "VERACITY_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "VERACITY_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question and get a fact-checked answer
    Ask(AskCommand),

    /// Knowledge base management (learn, search, stats, clean)
    Knowledge(KnowledgeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    let log_format = LogFormat::parse(&config.log_format).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown log format '{}'. Use 'pretty' or 'json'",
            config.log_format
        ))
    })?;
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_format)?;

    tracing::info!("Veracity CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_veracity_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Knowledge(_) => "knowledge",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
