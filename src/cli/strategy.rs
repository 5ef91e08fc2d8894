//! Strategy command: signal engine over the shared cache

use super::{pick_symbols, shutdown_token};
use crate::cache::PriceCache;
use crate::config::{Config, ConfigError};
use crate::link::{LinkConfig, ReconnectingClient};
use crate::protocol::Message;
use crate::signal::{SentimentGauge, SignalEngine};
use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct StrategyArgs {
    /// Price cache to attach to (or set PRICEBOOK_NAME)
    #[arg(long)]
    pub cache_name: Option<String>,

    /// Comma-separated symbols (defaults to config)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,
}

impl StrategyArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let codec = config.protocol.codec()?;
        let symbols = pick_symbols(&self.symbols, &config.cache.symbols);
        let name = self
            .cache_name
            .clone()
            .or_else(|| config.cache.name.clone())
            .ok_or(ConfigError::MissingCacheName)?;

        let cache = PriceCache::attach(&config.cache.region_dir, &name, &symbols)
            .with_context(|| format!("Failed to attach to price cache {name}"))?;
        tracing::info!(name = %name, symbols = ?symbols, "Attached to price cache");

        let sentiment = SentimentGauge::new();
        let news = ReconnectingClient::new(
            LinkConfig::from_settings(config.network.news_addr(), &config.link).name("news"),
            codec.clone(),
        );
        let gauge = sentiment.clone();
        let news_task = news.spawn(move |msg| match msg {
            Message::News(item) => gauge.set(item.sentiment),
            other => tracing::debug!(kind = other.kind(), "Ignoring message on news feed"),
        })?;

        // The order manager never writes back, so rely on EOF and TCP keepalive
        // instead of idling out.
        let orders = ReconnectingClient::new(
            LinkConfig::from_settings(config.network.order_addr(), &config.link)
                .name("orders")
                .idle_timeout(None),
            codec,
        );
        let orders_task = orders.spawn_sender()?;

        let cancel = shutdown_token();
        SignalEngine::new(config.signal.clone())
            .run(cache, sentiment, orders.clone(), cancel)
            .await;

        news.stop();
        orders.stop();
        for (link, task) in [("news", news_task), ("orders", orders_task)] {
            if let Err(e) = task.await {
                tracing::warn!(link, error = %e, "Link task failed");
            }
        }
        Ok(())
    }
}
