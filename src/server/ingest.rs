//! Inbound order server

use crate::execution::OrderSink;
use crate::link::{socket, LinkError};
use crate::protocol::{Message, MessageCodec};
use crate::telemetry::{adjust_gauge, increment, Counter, Gauge};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accepts order connections and hands each decoded order to a sink
pub struct IngestServer {
    listener: TcpListener,
    codec: MessageCodec,
}

impl IngestServer {
    pub async fn bind(addr: &str, codec: MessageCodec) -> Result<Self, LinkError> {
        let listener = socket::listen(addr).await?;
        Ok(Self { listener, codec })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept senders until cancelled
    pub async fn serve(self, sink: Arc<dyn OrderSink>, cancel: CancellationToken) {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Order server listening");

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((socket, peer)) => {
                    increment(Counter::ConnectionsAccepted);
                    tracing::info!(%peer, "Order sender connected");
                    let sink = sink.clone();
                    let codec = self.codec.clone();
                    let cancel = cancel.child_token();

                    tokio::spawn(async move {
                        adjust_gauge(Gauge::ActiveConnections, 1.0);
                        if let Err(e) = ingest(socket, codec, sink, cancel).await {
                            tracing::warn!(%peer, error = %e, "Order connection failed");
                        }
                        tracing::info!(%peer, "Order sender disconnected");
                        adjust_gauge(Gauge::ActiveConnections, -1.0);
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        tracing::info!("Order server stopped");
    }
}

async fn ingest(
    socket: TcpStream,
    codec: MessageCodec,
    sink: Arc<dyn OrderSink>,
    cancel: CancellationToken,
) -> Result<(), LinkError> {
    let mut reader = FramedRead::new(socket, codec);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = reader.next() => next,
        };

        match next.transpose()? {
            Some(Message::Order(order)) => {
                if let Err(e) = sink.record(order).await {
                    tracing::error!(error = %e, "Failed to record order");
                }
            }
            Some(other) => {
                tracing::debug!(kind = other.kind(), "Ignoring non-order message");
            }
            None => return Ok(()),
        }
    }
}
