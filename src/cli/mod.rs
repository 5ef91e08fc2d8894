//! CLI interface for tickwire
//!
//! Provides subcommands for:
//! - `gateway`: Broadcast synthetic prices and news
//! - `order-book`: Own the price cache and fill it from the price feed
//! - `strategy`: Run the signal engine against the cache and news feed
//! - `order-manager`: Receive and log orders
//! - `config`: Show the effective configuration

mod gateway;
mod order_book;
mod order_manager;
mod strategy;

pub use gateway::GatewayArgs;
pub use order_book::OrderBookArgs;
pub use order_manager::OrderManagerArgs;
pub use strategy::StrategyArgs;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "tickwire")]
#[command(about = "Streaming market data pipeline with a shared price cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Broadcast synthetic prices and news
    Gateway(GatewayArgs),
    /// Create the price cache and keep it updated from the price feed
    OrderBook(OrderBookArgs),
    /// Run the signal engine
    Strategy(StrategyArgs),
    /// Receive orders from strategies
    OrderManager(OrderManagerArgs),
    /// Show the effective configuration
    Config,
}

/// Token cancelled on Ctrl-C
pub(crate) fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                trigger.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    token
}

/// Symbols from the command line, else from config
pub(crate) fn pick_symbols(cli: &[String], configured: &[String]) -> Vec<String> {
    if cli.is_empty() {
        configured.to_vec()
    } else {
        cli.to_vec()
    }
}
