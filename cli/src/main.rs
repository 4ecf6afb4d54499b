//! FxHub command line interface.
//!
//! One-shot subcommands over a shared data directory: each invocation
//! reads the persisted state, performs one operation, prints the outcome
//! and exits. A single writing process at a time is assumed.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod commands;
mod config;

use commands::Cli;
use config::HubConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = HubConfig::from_env();
    if let Err(reason) = config.validate() {
        anyhow::bail!("Configuration error: {reason}");
    }

    commands::run(cli, config).await
}
