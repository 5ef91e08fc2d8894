//! Latest sentiment shared between the news link and the engine

use crate::telemetry::{set_gauge, Gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Neutral midpoint used before the first news item arrives
pub const NEUTRAL_SENTIMENT: u8 = 50;

#[derive(Debug, Clone)]
pub struct SentimentGauge(Arc<AtomicU8>);

impl SentimentGauge {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(NEUTRAL_SENTIMENT)))
    }

    /// Store a new value, clamped to `0..=100`
    pub fn set(&self, sentiment: u8) {
        let value = sentiment.min(100);
        self.0.store(value, Ordering::Relaxed);
        set_gauge(Gauge::Sentiment, f64::from(value));
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for SentimentGauge {
    fn default() -> Self {
        Self::new()
    }
}
