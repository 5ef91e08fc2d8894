//! Order book command: creates the price cache and writes the price feed into it

use super::{pick_symbols, shutdown_token};
use crate::cache::PriceCache;
use crate::config::Config;
use crate::link::{LinkConfig, ReconnectingClient};
use crate::protocol::Message;
use anyhow::Context;
use clap::Args;
use std::time::Duration;
use tokio::time::interval;

#[derive(Args, Debug)]
pub struct OrderBookArgs {
    /// Region name to create (generated when omitted)
    #[arg(long)]
    pub cache_name: Option<String>,

    /// Comma-separated symbols (defaults to config)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,
}

impl OrderBookArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let codec = config.protocol.codec()?;
        let symbols = pick_symbols(&self.symbols, &config.cache.symbols);
        let dir = &config.cache.region_dir;

        let mut cache = match self.cache_name.as_ref().or(config.cache.name.as_ref()) {
            Some(name) => PriceCache::create_named(dir, name, &symbols),
            None => PriceCache::create(dir, &symbols),
        }
        .context("Failed to create price cache")?;

        tracing::info!(
            name = cache.name(),
            dir = %dir.display(),
            symbols = ?symbols,
            "Price cache ready, pass this name to strategies via PRICEBOOK_NAME"
        );

        let writer = PriceCache::attach(dir, cache.name(), &symbols)
            .context("Failed to attach writer to price cache")?;
        let link = ReconnectingClient::new(
            LinkConfig::from_settings(config.network.price_addr(), &config.link).name("prices"),
            codec,
        );
        let handle = link.spawn(move |msg| match msg {
            Message::Price(tick) => {
                if let Err(e) = writer.update(&tick.symbol, tick.price) {
                    tracing::warn!(symbol = %tick.symbol, error = %e, "Price not cached");
                }
            }
            other => tracing::debug!(kind = other.kind(), "Ignoring message on price feed"),
        })?;

        let cancel = shutdown_token();
        let mut status = interval(Duration::from_millis(config.signal.status_interval_ms));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = status.tick() => {
                    let snapshot = cache.snapshot();
                    tracing::debug!(
                        version = snapshot.version(),
                        prices = ?snapshot.iter().collect::<Vec<_>>(),
                        "Cache snapshot"
                    );
                }
            }
        }

        link.stop();
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Price link task failed");
        }
        cache.destroy().context("Failed to destroy price cache")?;
        tracing::info!(name = cache.name(), "Price cache destroyed");
        Ok(())
    }
}
