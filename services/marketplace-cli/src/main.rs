//! Marketplace CLI
//!
//! Thin command-line front end over `marketplace-client`:
//! 1. Loads configuration (base URL, timeout, storage file)
//! 2. Opens the file-backed key-value store holding tokens and the cart
//! 3. Builds the authenticated client and runs one command

mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use marketplace_auth::FileStore;
use marketplace_client::{AuthenticatedClient, ClientOptions, MarketplaceApi};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::Config;

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        storage = %config.storage.path.display(),
        "configuration loaded"
    );

    let store = FileStore::load(config.storage.path.clone())
        .await
        .with_context(|| format!("failed to open storage {}", config.storage.path.display()))?;

    let options = ClientOptions::new(&config.api.base_url).with_timeout(config.timeout());
    let client = AuthenticatedClient::new(options, Arc::new(store))
        .context("failed to build HTTP client")?;

    commands::run(cli.command, MarketplaceApi::new(client)).await
}
