//! Order manager sink: counts, logs and optionally persists received orders

use super::OrderSink;
use crate::protocol::Order;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Number of most recent orders kept in memory
pub const RECENT_ORDERS: usize = 256;

/// Records every order the order manager receives
#[derive(Clone, Default)]
pub struct TradeLog {
    count: Arc<AtomicU64>,
    recent: Arc<RwLock<VecDeque<Order>>>,
    file: Option<Arc<Mutex<File>>>,
}

impl TradeLog {
    /// Create an in-memory trade log
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append each order as a JSON line to `path`
    pub async fn with_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;
        tracing::info!(path = %path.as_ref().display(), "Appending orders to trade log");
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
            ..Self::default()
        })
    }

    /// Number of orders recorded
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// The last [`RECENT_ORDERS`] orders, oldest first
    pub async fn recent(&self) -> Vec<Order> {
        self.recent.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl OrderSink for TradeLog {
    async fn record(&self, order: Order) -> anyhow::Result<()> {
        if let Some(file) = &self.file {
            let mut line = serde_json::to_string(&order)?;
            line.push('\n');
            let mut file = file.lock().await;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            n,
            symbol = %order.symbol,
            side = %order.side,
            qty = order.qty,
            price = order.price,
            sentiment = order.sentiment,
            "Order received"
        );

        let mut recent = self.recent.write().await;
        if recent.len() == RECENT_ORDERS {
            recent.pop_front();
        }
        recent.push_back(order);
        Ok(())
    }
}
