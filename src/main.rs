//! Signal Engine - confluence-based signal generation service
//!
//! On a fixed interval the engine:
//! 1. Fetches the live price for every monitored symbol
//! 2. Resolves pending signals the price has settled
//! 3. Judges the market through the indicator suite
//! 4. Scores confluence and emits BUY/SELL signals with full levels

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use signal_engine::config::EngineConfig;
use signal_engine::feed::{HttpPriceFeed, PriceFeed, SimulatedPriceFeed};
use signal_engine::indicators::ComputedIndicatorSource;
use signal_engine::runner::SignalRunner;
use signal_engine::store::MemorySignalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting Signal Engine...");

    let config = EngineConfig::from_env()?;
    info!(
        "Monitoring {} symbols every {}s (cooldown {}h)",
        config.symbols.len(),
        config.cycle_interval_secs,
        config.cooldown_hours
    );

    // Use the live price API when one is configured, the simulator otherwise
    let feed: Arc<dyn PriceFeed> = if std::env::var("PRICE_API_URL").is_ok() {
        let feed = HttpPriceFeed::new(&config.feed)?;
        info!("✓ Price feed: {}", config.feed.base_url);
        Arc::new(feed)
    } else {
        info!("✓ Price feed: simulated (set PRICE_API_URL for live data)");
        Arc::new(SimulatedPriceFeed::new())
    };

    let store = Arc::new(MemorySignalStore::new());
    let indicators = Arc::new(ComputedIndicatorSource::new(
        feed.clone(),
        config.candle_limit,
    ));
    info!("✓ Indicator suite ready ({} candles per evaluation)", config.candle_limit);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Ctrl-C received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    let runner = SignalRunner::new(config, feed, indicators, store);
    runner.run(shutdown_rx).await
}
