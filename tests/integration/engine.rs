//! Integration tests for the signal engine over a real price cache

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tickwire::cache::PriceCache;
use tickwire::config::SignalConfig;
use tickwire::execution::OrderRouter;
use tickwire::link::LinkError;
use tickwire::protocol::{Order, Side};
use tickwire::signal::{Position, SignalEngine};

#[derive(Default)]
struct Recorder {
    down: AtomicBool,
    orders: Mutex<Vec<Order>>,
}

#[async_trait]
impl OrderRouter for Recorder {
    async fn route(&self, order: &Order) -> Result<(), LinkError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.orders.lock().unwrap().push(order.clone());
        Ok(())
    }
}

impl Recorder {
    fn sent(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }
}

fn symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "MSFT".to_string()]
}

/// Feed `base` for 15 ticks then `recent` for 5: long MA 100, short MA `recent`
async fn warm_up(
    engine: &mut SignalEngine,
    cache: &PriceCache,
    recent: f64,
    sentiment: u8,
    router: &Recorder,
) -> Vec<Order> {
    let base = (2000.0 - 5.0 * recent) / 15.0;
    let mut sent = vec![];
    for i in 0..20 {
        let price = if i < 15 { base } else { recent };
        cache.update("AAPL", price).unwrap();
        sent.extend(engine.tick(&cache.snapshot(), sentiment, router).await);
    }
    sent
}

#[tokio::test]
async fn test_bullish_crossover_buys_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PriceCache::create(dir.path(), &symbols()).unwrap();
    let mut engine = SignalEngine::new(SignalConfig::default());
    let router = Recorder::default();

    let sent = warm_up(&mut engine, &cache, 105.0, 80, &router).await;
    let (short, long) = engine.moving_averages("AAPL").unwrap();
    assert!((short - 105.0).abs() < 1e-9);
    assert!((long - 100.0).abs() < 1e-9);

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].side, Side::Buy);
    assert_eq!(sent[0].symbol, "AAPL");
    assert_eq!(sent[0].price, 105.0);
    assert_eq!(sent[0].sentiment, 80);
    assert_eq!(sent[0].qty, 10);
    assert_eq!(engine.position("AAPL"), Position::Long);

    // Same tick again: already long.
    let again = engine.tick(&cache.snapshot(), 80, &router).await;
    assert!(again.is_empty());
    assert_eq!(router.sent().len(), 1);

    // MSFT never had a price, so it has no history and stays flat.
    assert!(engine.history("MSFT").is_none());
    assert_eq!(engine.position("MSFT"), Position::Flat);
    cache.destroy().unwrap();
}

#[tokio::test]
async fn test_conflicting_signals_do_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PriceCache::create(dir.path(), &symbols()).unwrap();
    let mut engine = SignalEngine::new(SignalConfig::default());
    let router = Recorder::default();

    let sent = warm_up(&mut engine, &cache, 95.0, 80, &router).await;
    assert!(sent.is_empty());
    assert_eq!(engine.position("AAPL"), Position::Flat);
    cache.destroy().unwrap();
}

#[tokio::test]
async fn test_bearish_agreement_sells() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PriceCache::create(dir.path(), &symbols()).unwrap();
    let mut engine = SignalEngine::new(SignalConfig::default());
    let router = Recorder::default();

    let sent = warm_up(&mut engine, &cache, 95.0, 20, &router).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].side, Side::Sell);
    assert_eq!(engine.position("AAPL"), Position::Short);
    cache.destroy().unwrap();
}

#[tokio::test]
async fn test_lost_order_is_retried_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PriceCache::create(dir.path(), &symbols()).unwrap();
    let mut engine = SignalEngine::new(SignalConfig::default());
    let router = Recorder::default();
    router.down.store(true, Ordering::SeqCst);

    let sent = warm_up(&mut engine, &cache, 105.0, 80, &router).await;
    assert!(sent.is_empty());
    assert_eq!(engine.position("AAPL"), Position::Flat);

    router.down.store(false, Ordering::SeqCst);
    let sent = engine.tick(&cache.snapshot(), 80, &router).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(engine.position("AAPL"), Position::Long);
    cache.destroy().unwrap();
}
