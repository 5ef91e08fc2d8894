//! Gateway command: price and news broadcast servers

use super::shutdown_token;
use crate::config::Config;
use crate::server::BroadcastServer;
use crate::source::{GbmPriceModel, NewsSource};
use anyhow::Context;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Seed the generators for reproducible streams
    #[arg(long)]
    pub seed: Option<u64>,
}

impl GatewayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let codec = config.protocol.codec()?;
        let write_timeout = config.link.io_timeout();

        let mut model = GbmPriceModel::from_config(&config.cache.symbols, &config.gateway);
        if let Some(seed) = self.seed {
            model = model.seed(seed);
        }
        tracing::info!(prices = ?model.prices(), "Initial prices");

        let price_addr = config.network.price_addr();
        let prices = BroadcastServer::bind(&price_addr, codec.clone(), write_timeout)
            .await
            .with_context(|| format!("Failed to bind price server on {price_addr}"))?
            .name("prices");

        let news_addr = config.network.news_addr();
        let news = BroadcastServer::bind(&news_addr, codec, write_timeout)
            .await
            .with_context(|| format!("Failed to bind news server on {news_addr}"))?
            .name("news");

        let news_interval = Duration::from_millis(config.gateway.news_interval_ms);
        let seed = self.seed;
        let cancel = shutdown_token();

        tokio::join!(
            prices.serve(move || model.source(), cancel.clone()),
            news.serve(
                move || match seed {
                    Some(seed) => NewsSource::with_seed(news_interval, seed),
                    None => NewsSource::new(news_interval),
                },
                cancel.clone(),
            ),
        );

        tracing::info!("Gateway stopped");
        Ok(())
    }
}
