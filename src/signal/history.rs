//! Fixed-capacity price history

use std::collections::VecDeque;

/// Most recent prices for one symbol, oldest evicted first
#[derive(Debug, Clone)]
pub struct PriceHistory {
    capacity: usize,
    prices: VecDeque<f64>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            prices: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a price, evicting the oldest when full
    pub fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent price
    pub fn last(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    /// Mean of the last `window` prices, `None` until that many are held
    pub fn moving_average(&self, window: usize) -> Option<f64> {
        if window == 0 || self.prices.len() < window {
            return None;
        }
        let sum: f64 = self.prices.iter().rev().take(window).sum();
        Some(sum / window as f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.prices.iter().copied()
    }
}
