//! Botho Keychain CLI
//!
//! Inspect and manage the endpoints the keychain talks to.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "botho-keychain")]
#[command(about = "Botho keychain - endpoint and request bridge tools")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom data directory
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Manage network endpoints
    Endpoints {
        #[command(subcommand)]
        action: EndpointAction,
    },

    /// Query the node behind the preferred endpoint
    Status {
        /// Query this endpoint instead of the preferred one
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Check a transfer recipient for phishing and exchange warnings
    CheckTransfer {
        /// Recipient account
        account: String,

        /// Currency symbol
        #[arg(short, long, default_value = "BTH")]
        currency: String,

        /// The transfer carries a memo
        #[arg(long)]
        memo: bool,
    },
}

#[derive(Subcommand)]
enum EndpointAction {
    /// List candidate endpoints, preferred first
    List,

    /// Add a custom endpoint
    Add {
        /// Endpoint URL
        url: String,
    },

    /// Remove a custom endpoint
    Remove {
        /// Endpoint URL
        url: String,
    },

    /// Set the preferred endpoint (URL, DEFAULT or TESTNET)
    Use {
        /// Endpoint identifier
        endpoint: String,
    },

    /// Show the endpoint DEFAULT resolves to
    Resolve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .context("Could not find home directory")?
            .join(".botho-keychain"),
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&data_dir, force),
        Commands::Endpoints { action } => {
            let home = commands::Home::load(&data_dir)?;
            match action {
                EndpointAction::List => commands::endpoints::list(&home).await,
                EndpointAction::Add { url } => commands::endpoints::add(&home, &url).await,
                EndpointAction::Remove { url } => commands::endpoints::remove(&home, &url).await,
                EndpointAction::Use { endpoint } => {
                    commands::endpoints::use_endpoint(&home, &endpoint).await
                }
                EndpointAction::Resolve => commands::endpoints::resolve(&home).await,
            }
        }
        Commands::Status { endpoint } => {
            let home = commands::Home::load(&data_dir)?;
            commands::status::run(&home, endpoint).await
        }
        Commands::CheckTransfer {
            account,
            currency,
            memo,
        } => {
            let home = commands::Home::load(&data_dir)?;
            commands::check_transfer::run(&home, &account, &currency, memo)
        }
    }
}
