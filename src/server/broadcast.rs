//! Fan-out server: one writer task per subscriber

use crate::link::LinkError;
use crate::protocol::{CodecError, Message, MessageCodec};
use crate::source::MessageSource;
use crate::telemetry::{adjust_gauge, increment, Counter, Gauge};
use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Streams framed messages to every connected subscriber
///
/// Each accepted connection gets its own source and its own task, so a slow
/// or dead subscriber only ever stalls itself. A write that exceeds the
/// write timeout ends that subscriber's connection.
pub struct BroadcastServer {
    listener: TcpListener,
    codec: MessageCodec,
    write_timeout: Duration,
    name: String,
}

impl BroadcastServer {
    /// Bind the listening socket
    pub async fn bind(
        addr: &str,
        codec: MessageCodec,
        write_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            codec,
            write_timeout,
            name: "broadcast".to_string(),
        })
    }

    /// Set the log label
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept subscribers until cancelled
    pub async fn serve<F, S>(self, make_source: F, cancel: CancellationToken)
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: MessageSource + 'static,
    {
        let name: Arc<str> = Arc::from(self.name.as_str());
        tracing::info!(
            server = %name,
            addr = ?self.listener.local_addr().ok(),
            "Server listening"
        );

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((socket, peer)) => {
                    increment(Counter::ConnectionsAccepted);
                    tracing::info!(server = %name, %peer, "Subscriber connected");

                    let source = make_source();
                    let codec = self.codec.clone();
                    let write_timeout = self.write_timeout;
                    let cancel = cancel.child_token();
                    let name = name.clone();

                    tokio::spawn(async move {
                        adjust_gauge(Gauge::ActiveConnections, 1.0);
                        match stream_to(socket, source, codec, write_timeout, cancel).await {
                            Ok(()) => tracing::debug!(server = %name, %peer, "Subscriber closed on shutdown"),
                            Err(e) => tracing::info!(server = %name, %peer, error = %e, "Subscriber disconnected"),
                        }
                        adjust_gauge(Gauge::ActiveConnections, -1.0);
                    });
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "Accept failed");
                    sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        tracing::info!(server = %name, "Server stopped");
    }
}

async fn stream_to<S: MessageSource>(
    socket: TcpStream,
    mut source: S,
    codec: MessageCodec,
    write_timeout: Duration,
    cancel: CancellationToken,
) -> Result<(), LinkError> {
    if let Err(e) = socket.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }
    let mut sink = FramedWrite::new(socket, codec);
    let mut ticker = interval(source.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let batch = source.next_batch();
        let write = async {
            for msg in &batch {
                sink.feed(msg).await?;
            }
            SinkExt::<&Message>::flush(&mut sink).await?;
            Ok::<_, CodecError>(())
        };

        match timeout(write_timeout, write).await {
            Ok(result) => result?,
            Err(_) => return Err(LinkError::Timeout("write")),
        }
    }
}
