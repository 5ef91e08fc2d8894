//! Integration tests for subscriber isolation in the broadcast server

use futures_util::StreamExt;
use std::time::Duration;
use tickwire::protocol::{Message, MessageCodec, PriceTick};
use tickwire::server::BroadcastServer;
use tickwire::source::MessageSource;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Emits large numbered price frames as fast as the interval allows
struct Flood {
    seq: u64,
    padding: String,
}

impl MessageSource for Flood {
    fn interval(&self) -> Duration {
        Duration::from_millis(1)
    }

    fn next_batch(&mut self) -> Vec<Message> {
        (0..32)
            .map(|_| {
                self.seq += 1;
                Message::Price(PriceTick {
                    symbol: self.padding.clone(),
                    price: self.seq as f64,
                    timestamp: 0.0,
                })
            })
            .collect()
    }
}

fn flood() -> Flood {
    Flood {
        seq: 0,
        padding: "X".repeat(1024),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stalled_subscriber_does_not_block_others() {
    let server = BroadcastServer::bind("127.0.0.1:0", MessageCodec::default(), Duration::from_millis(300))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(server.serve(flood, cancel.clone()));

    // Connects but never reads, so its socket buffers fill up.
    let stalled = TcpStream::connect(addr).await.unwrap();
    let active = TcpStream::connect(addr).await.unwrap();
    let mut reader = FramedRead::new(active, MessageCodec::default());

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut last = 0.0;
    let mut frames = 0u64;
    while Instant::now() < deadline {
        match timeout(Duration::from_millis(500), reader.next()).await {
            Ok(Some(Ok(Message::Price(tick)))) => {
                assert_eq!(tick.price, last + 1.0, "frames out of order");
                assert_eq!(tick.symbol.len(), 1024);
                last = tick.price;
                frames += 1;
            }
            other => panic!("active subscriber starved: {other:?}"),
        }
    }
    assert!(frames > 1_000, "only {frames} frames delivered");

    // The stalled subscriber was cut off after its write timeout; draining it hits EOF.
    let mut stalled = FramedRead::new(stalled, MessageCodec::default());
    timeout(Duration::from_secs(10), async {
        while let Some(frame) = stalled.next().await {
            assert!(frame.is_ok());
        }
    })
    .await
    .expect("stalled subscriber was never disconnected");

    cancel.cancel();
}

#[tokio::test]
async fn test_subscribers_get_independent_sequences() {
    let server = BroadcastServer::bind("127.0.0.1:0", MessageCodec::default(), Duration::from_secs(1))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(server.serve(flood, cancel.clone()));

    for _ in 0..2 {
        let socket = TcpStream::connect(addr).await.unwrap();
        let mut reader = FramedRead::new(socket, MessageCodec::default());
        match timeout(Duration::from_secs(1), reader.next()).await.unwrap() {
            Some(Ok(Message::Price(tick))) => assert_eq!(tick.price, 1.0),
            other => panic!("unexpected {other:?}"),
        }
    }
    cancel.cancel();
}
