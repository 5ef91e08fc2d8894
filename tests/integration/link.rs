//! Integration tests for the reconnecting client

use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tickwire::link::{ConnectionState, LinkConfig, LinkError, ReconnectingClient};
use tickwire::protocol::{Message, MessageCodec};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_util::codec::FramedRead;

const BACKOFF: Duration = Duration::from_millis(300);

fn config(addr: impl Into<String>) -> LinkConfig {
    LinkConfig::new(addr)
        .name("test")
        .backoff(BACKOFF)
        .connect_timeout(Duration::from_millis(500))
        .write_timeout(Duration::from_millis(500))
        .idle_timeout(None)
}

#[tokio::test]
async fn test_reconnects_after_server_restart() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = ReconnectingClient::new(config(addr.to_string()), MessageCodec::default());
    client.spawn(|_| {}).unwrap();

    let (socket, _) = listener.accept().await.unwrap();
    assert!(client.wait_for_state(ConnectionState::Connected, BACKOFF * 2).await);

    // Kill the producer: the link must notice and drop out of CONNECTED.
    drop(socket);
    drop(listener);
    assert!(
        client
            .wait_for_state(ConnectionState::Disconnected, Duration::from_secs(1))
            .await
    );
    assert!(matches!(
        client.send(&Message::news(1)).await,
        Err(LinkError::NotConnected)
    ));

    sleep(BACKOFF / 2).await;
    let listener = TcpListener::bind(addr).await.unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

    assert!(client.wait_for_state(ConnectionState::Connected, BACKOFF * 2).await);
    let _socket = accept.await.unwrap().unwrap();
    client.stop();
}

#[tokio::test]
async fn test_send_when_disconnected_never_blocks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = ReconnectingClient::new(config(addr), MessageCodec::default());
    client.spawn_sender().unwrap();

    for _ in 0..5 {
        let started = Instant::now();
        let result = client.send(&Message::news(50)).await;
        assert!(matches!(result, Err(LinkError::NotConnected)));
        assert!(started.elapsed() < Duration::from_millis(100));
        sleep(Duration::from_millis(50)).await;
    }
    assert_ne!(client.state(), ConnectionState::Connected);
    client.stop();
}

#[tokio::test]
async fn test_sends_arrive_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = ReconnectingClient::new(config(addr), MessageCodec::default());
    client.spawn_sender().unwrap();
    let (socket, _) = listener.accept().await.unwrap();
    assert!(client.wait_for_state(ConnectionState::Connected, Duration::from_secs(1)).await);

    for sentiment in 0..=100u8 {
        client.send(&Message::news(sentiment)).await.unwrap();
    }

    let mut reader = FramedRead::new(socket, MessageCodec::default());
    for expected in 0..=100u8 {
        match timeout(Duration::from_secs(1), reader.next()).await.unwrap() {
            Some(Ok(Message::News(n))) => assert_eq!(n.sentiment, expected),
            other => panic!("unexpected {other:?}"),
        }
    }
    client.stop();
}

#[tokio::test]
async fn test_stop_during_backoff() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = ReconnectingClient::new(
        config(addr).backoff(Duration::from_secs(30)),
        MessageCodec::default(),
    );
    let handle = client.spawn(|_| {}).unwrap();
    sleep(Duration::from_millis(100)).await;

    client.stop();
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("stop not honored during backoff")
        .unwrap();
    assert!(client.is_stopped());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
