//! # tytux CLI
//!
//! Command-line interface for TyTuX - converse with a GraphQL analytics API through an LLM.
//!
//! ## Usage
//!
//! - `tytux` - Start interactive mode
//! - `tytux "question"` - Answer a single question
//! - `tytux tools` - Show the tools the executor offers
//! - `tytux check-env` - Report which environment variables are set

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{check_env_command, interactive_command, run_command, tools_command};
use config::CliConfigLoader;

/// tytux - Command your data
#[derive(Parser)]
#[command(name = "tytux")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Converse with a GraphQL analytics API through an LLM")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol to use (google_ai, openai, azure_openai)
    #[arg(long)]
    protocol: Option<String>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// How tools are reached (subprocess, direct)
    #[arg(long)]
    executor: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output mode
    #[arg(short = 'd', long = "debug")]
    debug_output: bool,

    /// The question to answer (if provided, runs in single-question mode)
    question: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available tools
    Tools,

    /// Report which environment variables are set
    CheckEnv {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(protocol) = &cli.protocol {
        loader = loader.with_protocol_override(protocol.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    if let Some(executor) = &cli.executor {
        loader = loader.with_executor_override(executor.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tytux_core::init_tracing_with_debug(cli.verbose || cli.debug_output);

    let config_loader = build_config_loader(&cli);

    match (cli.question, cli.command) {
        (Some(question), None) => run_command(question, config_loader, cli.debug_output).await,
        (Some(_), Some(_)) => {
            tracing::error!("Error: Cannot specify both a question and a subcommand");
            std::process::exit(1);
        }
        (None, Some(Commands::Tools)) => tools_command(config_loader).await,
        (None, Some(Commands::CheckEnv { json })) => check_env_command(json).await,
        (None, None) => interactive_command(config_loader, cli.debug_output).await,
    }
}
