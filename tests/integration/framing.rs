//! Integration tests for the framed channel

use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tickwire::protocol::{Delimiter, Message, MessageCodec, NewsItem, Order, PriceTick, Side};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

fn messages() -> Vec<Message> {
    vec![
        Message::Price(PriceTick {
            symbol: "AAPL".to_string(),
            price: 187.25,
            timestamp: 1_700_000_000.5,
        }),
        Message::News(NewsItem {
            sentiment: 0,
            timestamp: 1_700_000_001.0,
        }),
        Message::News(NewsItem {
            sentiment: 100,
            timestamp: 1_700_000_002.0,
        }),
        Message::Order(Order {
            symbol: "MSFT".to_string(),
            side: Side::Sell,
            qty: 10,
            price: 412.1,
            sentiment: 35,
            timestamp: 1_700_000_003.25,
        }),
        // Delimiter inside a string value must survive.
        Message::Price(PriceTick {
            symbol: "A*B".to_string(),
            price: 1.5,
            timestamp: 1_700_000_004.0,
        }),
        Message::Order(Order {
            symbol: "AMZN".to_string(),
            side: Side::Buy,
            qty: 1,
            price: 0.01,
            sentiment: 61,
            timestamp: 1_700_000_005.0,
        }),
    ]
}

fn wire(messages: &[Message], delimiter: Delimiter) -> Vec<u8> {
    let mut bytes = vec![];
    for msg in messages {
        bytes.extend_from_slice(msg.encode(delimiter).unwrap().as_bytes());
        bytes.push(delimiter.byte());
    }
    bytes
}

async fn decode_chunked(bytes: &[u8], chunks: &[usize], codec: MessageCodec) -> Vec<Message> {
    let mut builder = tokio_test::io::Builder::new();
    let mut rest = bytes;
    for &size in chunks {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(size.min(rest.len()));
        builder.read(head);
        rest = tail;
    }
    if !rest.is_empty() {
        builder.read(rest);
    }

    let mut reader = FramedRead::new(builder.build(), codec);
    let mut out = vec![];
    while let Some(msg) = reader.next().await {
        out.push(msg.unwrap());
    }
    out
}

#[tokio::test]
async fn test_random_chunkings_preserve_frames() {
    let expected = messages();
    let bytes = wire(&expected, Delimiter::default());
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let mut chunks = vec![];
        let mut total = 0;
        while total < bytes.len() {
            let size = rng.random_range(1..=24);
            chunks.push(size);
            total += size;
        }
        let decoded = decode_chunked(&bytes, &chunks, MessageCodec::default()).await;
        assert_eq!(decoded, expected, "chunks {chunks:?}");
    }
}

#[tokio::test]
async fn test_byte_at_a_time() {
    let expected = messages();
    let bytes = wire(&expected, Delimiter::default());
    let chunks = vec![1; bytes.len()];
    assert_eq!(decode_chunked(&bytes, &chunks, MessageCodec::default()).await, expected);
}

#[tokio::test]
async fn test_mixed_encodings_and_garbage() {
    let stream = b"AAPL,101.5*{\"type\":\"news\",\"sentiment\":70}*not a frame**\
{\"kind\":\"price\",\"sym\":\"MSFT\",\"px\":300.25}*NEWS,101*NEWS,5*";
    let decoded = decode_chunked(stream, &[7, 3, 11], MessageCodec::default()).await;

    assert_eq!(decoded.len(), 4);
    assert!(matches!(&decoded[0], Message::Price(t) if t.symbol == "AAPL" && t.price == 101.5));
    assert!(matches!(&decoded[1], Message::News(n) if n.sentiment == 70));
    assert!(matches!(&decoded[2], Message::Price(t) if t.symbol == "MSFT" && t.price == 300.25));
    assert!(matches!(&decoded[3], Message::News(n) if n.sentiment == 5));
}

#[tokio::test]
async fn test_custom_delimiter_over_tcp() {
    let delimiter = Delimiter::parse("#").unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let expected = messages();

    let sent = expected.clone();
    let writer = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut sink = FramedWrite::new(socket, MessageCodec::new(delimiter));
        for msg in &sent {
            sink.send(msg).await.unwrap();
        }
    });

    let socket = TcpStream::connect(addr).await.unwrap();
    let reader = FramedRead::new(socket, MessageCodec::new(delimiter));
    let received: Vec<Message> = reader.map(|m| m.unwrap()).collect().await;
    writer.await.unwrap();

    assert_eq!(received, expected);
}
