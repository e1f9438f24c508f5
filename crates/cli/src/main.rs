//! Catboard CLI entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP edge handler
//! - `doctor`: Diagnose configuration and the computation module
//! - `config`: Show, validate, or locate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "catboard",
    about = "Catboard — HTTP edge handler for WebAssembly computation modules",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml (defaults to ~/.catboard/config.toml)
    #[arg(short, long, global = true, env = "CATBOARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP edge handler
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose configuration and the computation module
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(commands::default_config_path);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(&config_path, port).await?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(&config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(&config_path).await?,
        },
    }

    Ok(())
}
