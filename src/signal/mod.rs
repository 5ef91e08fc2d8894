//! Signal generation module
//!
//! Combines a moving-average crossover on cached prices with the latest
//! news sentiment and turns agreeing signals into position transitions.

mod engine;
mod history;
mod sentiment;
mod types;

pub use engine::SignalEngine;
pub use history::PriceHistory;
pub use sentiment::SentimentGauge;
pub use types::{combine, price_signal, sentiment_signal, Position, Signal};
