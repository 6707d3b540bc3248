use anyhow::Result;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use token_radar::aggregator::TokenAggregator;
use token_radar::cache::CacheStore;
use token_radar::cli::Cli;
use token_radar::config::Config;
use token_radar::scheduler::DiffScheduler;
use token_radar::subscriptions::SubscriptionRegistry;
use token_radar::web::{WebServer, WsHub};
use token_radar::{logging, metrics};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.debug);

    info!("Starting token-radar...");

    // Load configuration; env vars override file values
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load configuration from {:?}: {}", path, e))?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    info!("Configuration loaded successfully.");

    metrics::init()?;

    // Initialize components
    let cache = Arc::new(CacheStore::new(&config.cache.redis_url)?);
    let aggregator = Arc::new(TokenAggregator::new(cache, &config)?);
    info!("Token aggregator initialized.");

    let registry = Arc::new(SubscriptionRegistry::new());
    let hub = Arc::new(WsHub::new());

    let scheduler = DiffScheduler::new(
        aggregator.clone(),
        registry.clone(),
        hub.clone(),
        Duration::from_millis(config.scheduler.interval_ms),
    );
    let scheduler_handle = scheduler.start();
    info!("Diff scheduler started.");

    let server = WebServer::new(aggregator, registry, hub);
    server.start(&config.server.host, config.server.port).await?;

    // warp only returns once the listener shuts down; stop the refresh
    // loop before exiting so the process ends cleanly
    scheduler_handle.stop().await;
    Ok(())
}
