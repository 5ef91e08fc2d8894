//! Synthetic message sources for the broadcast server
//!
//! A source yields the batch of messages a connection should receive each
//! interval. Every connection owns its own source instance.

mod gbm;
mod news;

pub use gbm::{GbmParams, GbmPriceModel, GbmPriceSource};
pub use news::NewsSource;

use crate::protocol::Message;
use std::time::Duration;

/// Produces messages for one subscriber connection
pub trait MessageSource: Send {
    /// Delay between batches
    fn interval(&self) -> Duration;

    /// Next batch to write, in order
    fn next_batch(&mut self) -> Vec<Message>;
}
