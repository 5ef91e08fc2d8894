//! End-to-end integration tests

use std::sync::Arc;
use std::time::Duration;
use tickwire::cache::PriceCache;
use tickwire::config::{Config, SignalConfig};
use tickwire::execution::{OrderSink, TradeLog};
use tickwire::link::{LinkConfig, ReconnectingClient};
use tickwire::protocol::{Message, MessageCodec, Side};
use tickwire::server::{BroadcastServer, IngestServer};
use tickwire::signal::{SentimentGauge, SignalEngine};
use tickwire::source::MessageSource;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

#[test]
fn test_config_example_is_valid() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.cache.symbols, vec!["AAPL", "MSFT", "AMZN"]);
    assert_eq!(config.network.price_addr(), "localhost:7001");
    assert_eq!(config.signal.long_window, 20);
}

/// Steadily rising price for one symbol
struct Rising {
    price: f64,
}

impl MessageSource for Rising {
    fn interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    fn next_batch(&mut self) -> Vec<Message> {
        self.price += 0.5;
        vec![Message::price("AAPL", self.price)]
    }
}

/// Constant bullish news
struct Bullish;

impl MessageSource for Bullish {
    fn interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    fn next_batch(&mut self) -> Vec<Message> {
        vec![Message::news(90)]
    }
}

fn link(addr: std::net::SocketAddr, name: &str) -> LinkConfig {
    LinkConfig::new(addr.to_string())
        .name(name)
        .backoff(Duration::from_millis(100))
        .connect_timeout(Duration::from_secs(1))
        .write_timeout(Duration::from_secs(1))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipeline_delivers_buy_order() {
    let cancel = CancellationToken::new();
    let codec = MessageCodec::default();
    let timeout = Duration::from_secs(1);

    // Gateway
    let prices = BroadcastServer::bind("127.0.0.1:0", codec.clone(), timeout).await.unwrap();
    let news = BroadcastServer::bind("127.0.0.1:0", codec.clone(), timeout).await.unwrap();
    let (price_addr, news_addr) = (prices.local_addr().unwrap(), news.local_addr().unwrap());
    tokio::spawn(prices.serve(|| Rising { price: 100.0 }, cancel.clone()));
    tokio::spawn(news.serve(|| Bullish, cancel.clone()));

    // Order manager
    let ingest = IngestServer::bind("127.0.0.1:0", codec.clone()).await.unwrap();
    let order_addr = ingest.local_addr().unwrap();
    let log = TradeLog::new();
    let sink: Arc<dyn OrderSink> = Arc::new(log.clone());
    tokio::spawn(ingest.serve(sink, cancel.clone()));

    // Order book: price feed into the cache
    let dir = tempfile::tempdir().unwrap();
    let symbols = vec!["AAPL".to_string()];
    let mut cache = PriceCache::create(dir.path(), &symbols).unwrap();
    let writer = PriceCache::attach(dir.path(), cache.name(), &symbols).unwrap();
    let price_link = ReconnectingClient::new(link(price_addr, "prices"), codec.clone());
    price_link
        .spawn(move |msg| {
            if let Message::Price(tick) = msg {
                writer.update(&tick.symbol, tick.price).unwrap();
            }
        })
        .unwrap();

    // Strategy
    let reader = PriceCache::attach(dir.path(), cache.name(), &symbols).unwrap();
    let sentiment = SentimentGauge::new();
    let gauge = sentiment.clone();
    let news_link = ReconnectingClient::new(link(news_addr, "news"), codec.clone());
    news_link
        .spawn(move |msg| {
            if let Message::News(item) = msg {
                gauge.set(item.sentiment);
            }
        })
        .unwrap();
    let order_link = ReconnectingClient::new(link(order_addr, "orders").idle_timeout(None), codec);
    order_link.spawn_sender().unwrap();

    let engine = SignalEngine::new(SignalConfig {
        short_window: 2,
        long_window: 5,
        poll_interval_ms: 20,
        ..SignalConfig::default()
    });
    let engine_task = tokio::spawn(engine.run(reader, sentiment, order_link.clone(), cancel.clone()));

    let deadline = Instant::now() + Duration::from_secs(10);
    while log.count() == 0 && Instant::now() < deadline {
        sleep(Duration::from_millis(20)).await;
    }

    let orders = log.recent().await;
    assert!(!orders.is_empty(), "no order reached the order manager");
    assert_eq!(orders[0].symbol, "AAPL");
    assert_eq!(orders[0].side, Side::Buy);
    assert_eq!(orders[0].sentiment, 90);
    assert!(orders[0].price > 100.0);

    // Rising prices and bullish news never flip the position, so one order only.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(log.count(), 1);

    cancel.cancel();
    price_link.stop();
    news_link.stop();
    order_link.stop();
    engine_task.await.unwrap();
    cache.destroy().unwrap();
}
