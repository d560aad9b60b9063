pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;
pub mod updater;

use crate::core::config::AppConfig;
use crate::core::freshness::FreshnessEvaluator;
use crate::core::source::{FeedSource, SourceFetcher};
use crate::core::{SnapshotCache, UpdateError};
use crate::providers::file::FileSource;
use crate::providers::util::with_deadline;
use crate::providers::web::WebSource;
use crate::server::HttpServer;
use crate::updater::Updater;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

pub enum AppCommand {
    /// Keep the rates up to date and serve them until interrupted
    Run,
    /// Download the feed once into the configured local file
    Fetch,
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    match command {
        AppCommand::Run => run(&config, shutdown_signal()).await,
        AppCommand::Fetch => save_feed_to_file(&config).await,
    }
}

/// Wires the updater, the cache and the HTTP server from `config` and runs
/// until `shutdown` resolves.
pub async fn run(config: &AppConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    info!("Currency rates keeper starting...");

    let policy = config.update.policy()?;
    let source = providers::feed_source(&config.source)?;
    info!(source = source.name(), "Feed source selected");

    let storage = store::open_storage(config)?;
    let cache = Arc::new(SnapshotCache::new());
    let server = HttpServer::new(config.server.socket_addr()?, Arc::clone(&cache));

    let updater = Updater::new(
        storage,
        SourceFetcher::new(source, config.timeouts.source()),
        FreshnessEvaluator::new(policy),
        cache,
    )
    .with_storage_deadline(config.timeouts.storage())
    .with_retry_interval(config.update.retry_interval());

    updater.run(server, shutdown).await;
    info!("Currency rates keeper stopped");
    Ok(())
}

/// Downloads the feed and replaces the local snapshot file with it.
pub async fn save_feed_to_file(config: &AppConfig) -> Result<()> {
    let path = config
        .source
        .file_path
        .as_deref()
        .context("source.file_path is not configured")?;

    let source = WebSource::new(&config.source.url)?;
    let deadline = config.timeouts.source();
    let data = with_deadline(deadline, source.fetch_bytes(), || {
        UpdateError::SourceUnavailable(format!("no response within {deadline:?}"))
    })
    .await
    .context("Cannot get currencies from web")?;

    let file = FileSource::new(path);
    file.overwrite(&data)
        .await
        .context("Cannot write currencies to file")?;

    info!("Currency data saved in file: {}", file.path().display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl+C, running until killed");
        std::future::pending::<()>().await;
    }
}
