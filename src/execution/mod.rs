//! Order execution seams
//!
//! The signal engine hands orders to an [`OrderRouter`]; the order manager
//! hands what it receives to an [`OrderSink`].

mod router;
mod trade_log;

pub use trade_log::TradeLog;

use crate::link::LinkError;
use crate::protocol::Order;
use async_trait::async_trait;

/// Delivers orders to the order manager
#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Send one order; an error means it was not delivered
    async fn route(&self, order: &Order) -> Result<(), LinkError>;
}

/// Consumes orders received by the order manager
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Record one received order
    async fn record(&self, order: Order) -> anyhow::Result<()>;
}
