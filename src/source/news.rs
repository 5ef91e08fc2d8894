//! Random sentiment scores

use super::MessageSource;
use crate::protocol::Message;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Emits one uniformly random sentiment in `0..=100` per interval
pub struct NewsSource {
    interval: Duration,
    rng: StdRng,
}

impl NewsSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(interval: Duration, seed: u64) -> Self {
        Self {
            interval,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MessageSource for NewsSource {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_batch(&mut self) -> Vec<Message> {
        vec![Message::news(self.rng.random_range(0..=100))]
    }
}
