//! Geometric Brownian Motion price walk
//!
//! Each step multiplies every price by exp((mu - sigma^2/2) dt + sigma sqrt(dt) z)
//! with z ~ N(0, 1). The walk is shared by all subscribers, so every
//! connection advances the same set of prices.

use super::MessageSource;
use crate::config::GatewayConfig;
use crate::protocol::Message;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// GBM walk parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbmParams {
    /// Drift per unit time
    pub drift: f64,
    /// Volatility per unit time
    pub volatility: f64,
    /// Time step in seconds
    pub dt: f64,
}

impl GbmParams {
    /// Apply one step to `price` using standard normal draw `z`
    pub fn step(&self, price: f64, z: f64) -> f64 {
        let drift = (self.drift - 0.5 * self.volatility * self.volatility) * self.dt;
        let diffusion = self.volatility * self.dt.sqrt() * z;
        price * (drift + diffusion).exp()
    }
}

/// Shared GBM price state
#[derive(Debug, Clone)]
pub struct GbmPriceModel {
    params: GbmParams,
    interval: Duration,
    prices: Arc<Mutex<Vec<(String, f64)>>>,
    seed: Option<u64>,
}

impl GbmPriceModel {
    /// Create a model with explicit starting prices
    pub fn new(prices: Vec<(String, f64)>, params: GbmParams, interval: Duration) -> Self {
        Self {
            params,
            interval,
            prices: Arc::new(Mutex::new(prices)),
            seed: None,
        }
    }

    /// Create a model from gateway config, drawing initial prices uniformly
    pub fn from_config(symbols: &[String], config: &GatewayConfig) -> Self {
        let mut rng = StdRng::from_os_rng();
        let (lo, hi) = (config.initial_price_min, config.initial_price_max);
        let prices = symbols
            .iter()
            .map(|s| {
                let p = if hi > lo { rng.random_range(lo..hi) } else { lo };
                (s.clone(), p)
            })
            .collect();

        let interval = Duration::from_millis(config.price_interval_ms);
        let params = GbmParams {
            drift: config.drift,
            volatility: config.volatility,
            dt: interval.as_secs_f64(),
        };
        Self::new(prices, params, interval)
    }

    /// Seed per-connection generators for reproducible walks
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Current prices
    pub fn prices(&self) -> Vec<(String, f64)> {
        self.prices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Advance every price one step and return ticks rounded to cents
    pub fn step<R: Rng>(&self, rng: &mut R) -> Vec<Message> {
        let mut prices = self.prices.lock().unwrap_or_else(PoisonError::into_inner);
        prices
            .iter_mut()
            .map(|(symbol, price)| {
                let z: f64 = rng.sample(StandardNormal);
                *price = self.params.step(*price, z);
                Message::price(symbol.clone(), round_cents(*price))
            })
            .collect()
    }

    /// Create a source for one subscriber
    pub fn source(&self) -> GbmPriceSource {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        GbmPriceSource {
            model: self.clone(),
            rng,
        }
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Per-connection view of a [`GbmPriceModel`]
pub struct GbmPriceSource {
    model: GbmPriceModel,
    rng: StdRng,
}

impl MessageSource for GbmPriceSource {
    fn interval(&self) -> Duration {
        self.model.interval
    }

    fn next_batch(&mut self) -> Vec<Message> {
        self.model.step(&mut self.rng)
    }
}
