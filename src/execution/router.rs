//! Routing orders over a reconnecting link

use super::OrderRouter;
use crate::link::{LinkError, ReconnectingClient};
use crate::protocol::{Message, Order};
use crate::telemetry::{increment, Counter};
use async_trait::async_trait;

#[async_trait]
impl OrderRouter for ReconnectingClient {
    async fn route(&self, order: &Order) -> Result<(), LinkError> {
        match self.send(&Message::Order(order.clone())).await {
            Ok(()) => {
                increment(Counter::OrdersSent);
                Ok(())
            }
            Err(e) => {
                increment(Counter::OrdersFailed);
                Err(e)
            }
        }
    }
}
