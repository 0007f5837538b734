//! AMM Fader - fade isolated price shocks on AMM pools
//!
//! # WARNING
//! - This engine decides trades with real money when wired to an executor.
//! - Fading a move that turns out to be informed flow loses quickly; the
//!   stop-loss and hold limits are load-bearing, not decorative.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use amm_fader::cli::commands;
use amm_fader::config::Config;

/// AMM Fader - isolated-shock fade engine
#[derive(Parser)]
#[command(name = "fade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the fade engine
    Start {
        /// Replay events from a JSONL file instead of reading stdin
        #[arg(long)]
        feed: Option<String>,

        /// Run without persisting positions
        #[arg(long)]
        dry_run: bool,
    },

    /// Show live positions
    Status,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("amm_fader=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { feed, dry_run } => {
            commands::start(&config, feed.as_deref(), dry_run).await
        }
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
