//! Signal engine: polls the price cache and emits orders on transitions

use super::history::PriceHistory;
use super::sentiment::SentimentGauge;
use super::types::{combine, price_signal, sentiment_signal, Position};
use crate::cache::{PriceCache, PriceSnapshot};
use crate::config::SignalConfig;
use crate::execution::OrderRouter;
use crate::protocol::{unix_timestamp, Order, Side};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct SymbolState {
    history: PriceHistory,
    position: Position,
}

/// Per-symbol crossover + sentiment state machine
///
/// History and positions are private to the engine and only mutated by
/// [`tick`](Self::tick). A position changes only after the order for it was
/// handed to the router successfully; a failed send leaves it as it was so
/// the next tick retries the same transition.
pub struct SignalEngine {
    config: SignalConfig,
    states: HashMap<String, SymbolState>,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Current position for a symbol (flat if never seen)
    pub fn position(&self, symbol: &str) -> Position {
        self.states
            .get(symbol)
            .map(|s| s.position)
            .unwrap_or_default()
    }

    /// Price history for a symbol
    pub fn history(&self, symbol: &str) -> Option<&PriceHistory> {
        self.states.get(symbol).map(|s| &s.history)
    }

    /// Short and long moving averages, once enough samples are held
    pub fn moving_averages(&self, symbol: &str) -> Option<(f64, f64)> {
        let history = self.history(symbol)?;
        Some((
            history.moving_average(self.config.short_window)?,
            history.moving_average(self.config.long_window)?,
        ))
    }

    /// Decision for a symbol given the current history and sentiment
    pub fn decide(&self, symbol: &str, sentiment: u8) -> Option<Side> {
        let price = self
            .moving_averages(symbol)
            .map(|(short, long)| price_signal(short, long));
        let news = sentiment_signal(
            sentiment,
            self.config.bullish_threshold,
            self.config.bearish_threshold,
        );
        combine(price, news)
    }

    /// Run one poll step over `snapshot`, returning the orders delivered
    pub async fn tick<R>(&mut self, snapshot: &PriceSnapshot, sentiment: u8, router: &R) -> Vec<Order>
    where
        R: OrderRouter + ?Sized,
    {
        if !snapshot.is_consistent() {
            tracing::debug!(version = snapshot.version(), "Snapshot overlapped a write, skipping tick");
            return vec![];
        }

        let mut sent = vec![];
        for (symbol, price) in snapshot.iter() {
            if price.is_nan() {
                continue;
            }

            let capacity = self.config.long_window;
            self.states
                .entry(symbol.to_string())
                .or_insert_with(|| SymbolState {
                    history: PriceHistory::new(capacity),
                    position: Position::Flat,
                })
                .history
                .push(price);

            let Some(side) = self.decide(symbol, sentiment) else {
                continue;
            };
            if !self.position(symbol).accepts(side) {
                continue;
            }

            let order = Order {
                symbol: symbol.to_string(),
                side,
                qty: self.config.order_qty,
                price,
                sentiment,
                timestamp: unix_timestamp(),
            };

            match router.route(&order).await {
                Ok(()) => {
                    let position = Position::after(side);
                    if let Some(state) = self.states.get_mut(symbol) {
                        state.position = position;
                    }
                    tracing::info!(
                        symbol,
                        side = %side,
                        qty = order.qty,
                        price,
                        sentiment,
                        position = %position,
                        "Order sent"
                    );
                    sent.push(order);
                }
                Err(e) => {
                    tracing::warn!(symbol, side = %side, error = %e, "Order not delivered, position unchanged");
                }
            }
        }
        sent
    }

    /// Poll the cache until cancelled
    pub async fn run<R>(
        mut self,
        cache: PriceCache,
        sentiment: SentimentGauge,
        router: R,
        cancel: CancellationToken,
    ) where
        R: OrderRouter,
    {
        let mut poll = interval(Duration::from_millis(self.config.poll_interval_ms));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status = interval(Duration::from_millis(self.config.status_interval_ms));
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            cache = cache.name(),
            short_window = self.config.short_window,
            long_window = self.config.long_window,
            "Signal engine started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = status.tick() => {
                    let snapshot = cache.snapshot();
                    let prices: Vec<String> = snapshot
                        .iter()
                        .map(|(symbol, price)| format!("{symbol}={price:.2}"))
                        .collect();
                    tracing::info!(sentiment = sentiment.get(), prices = %prices.join(" "), "Status");
                }
                _ = poll.tick() => {
                    let snapshot = cache.snapshot();
                    self.tick(&snapshot, sentiment.get(), &router).await;
                }
            }
        }

        tracing::info!("Signal engine stopped");
    }
}
