//! Order manager command

use super::shutdown_token;
use crate::config::Config;
use crate::execution::{OrderSink, TradeLog};
use crate::server::IngestServer;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct OrderManagerArgs {
    /// Append received orders as JSON lines to this file
    #[arg(long)]
    pub trade_log: Option<PathBuf>,
}

impl OrderManagerArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let codec = config.protocol.codec()?;
        let log = match self.trade_log.as_ref().or(config.order_manager.trade_log.as_ref()) {
            Some(path) => TradeLog::with_file(path)
                .await
                .with_context(|| format!("Failed to open trade log {}", path.display()))?,
            None => TradeLog::new(),
        };

        let addr = config.network.order_addr();
        let server = IngestServer::bind(&addr, codec)
            .await
            .with_context(|| format!("Failed to bind order server on {addr}"))?;

        let sink: Arc<dyn OrderSink> = Arc::new(log.clone());
        server.serve(sink, shutdown_token()).await;

        tracing::info!(orders = log.count(), "Order manager stopped");
        Ok(())
    }
}
