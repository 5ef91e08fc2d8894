//! Framed TCP client with automatic reconnection

use super::socket;
use super::types::{ConnectionState, LinkConfig, LinkError};
use crate::protocol::{Message, MessageCodec};
use crate::telemetry::{increment, Counter};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

/// Write side of the live connection
struct Connection {
    sink: FramedWrite<OwnedWriteHalf, MessageCodec>,
    /// Cancelled when this connection must be abandoned
    token: CancellationToken,
}

struct Shared {
    config: LinkConfig,
    codec: MessageCodec,
    state: watch::Sender<ConnectionState>,
    writer: Mutex<Option<Connection>>,
    cancel: CancellationToken,
    running: AtomicBool,
}

/// Long-lived link that keeps reconnecting until stopped
///
/// The connect/read loop runs as its own task (see [`spawn`](Self::spawn)).
/// Inbound messages go to the handler; [`send`](Self::send) may be called
/// concurrently from other tasks. Cloning yields another handle to the same
/// link.
#[derive(Clone)]
pub struct ReconnectingClient {
    shared: Arc<Shared>,
}

impl ReconnectingClient {
    /// Create a client; nothing connects until [`spawn`](Self::spawn)
    pub fn new(config: LinkConfig, codec: MessageCodec) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                codec,
                state,
                writer: Mutex::new(None),
                cancel: CancellationToken::new(),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Get the configured address
    pub fn addr(&self) -> &str {
        &self.shared.config.addr
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the link reaches `state`, up to `limit`
    pub async fn wait_for_state(&self, state: ConnectionState, limit: Duration) -> bool {
        let mut rx = self.watch_state();
        let reached = timeout(limit, rx.wait_for(|s| *s == state))
            .await
            .map(|r| r.is_ok());
        reached == Ok(true)
    }

    /// Start the connect/read loop, handing every inbound message to `handler`
    pub fn spawn<H>(&self, handler: H) -> Result<JoinHandle<()>, LinkError>
    where
        H: FnMut(Message) + Send + 'static,
    {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(LinkError::AlreadyRunning);
        }
        let shared = self.shared.clone();
        Ok(tokio::spawn(async move {
            shared.run(handler).await;
        }))
    }

    /// Start the loop for a link that only sends; inbound messages are ignored
    pub fn spawn_sender(&self) -> Result<JoinHandle<()>, LinkError> {
        let name = self.shared.config.name.clone();
        self.spawn(move |msg| {
            tracing::debug!(link = %name, kind = msg.kind(), "Ignoring inbound message");
        })
    }

    /// Write one frame on the live connection
    ///
    /// Fails immediately with [`LinkError::NotConnected`] when there is no
    /// connection. A failed write tears the connection down so the loop
    /// reconnects; the message is not retried.
    pub async fn send(&self, msg: &Message) -> Result<(), LinkError> {
        let mut guard = self.shared.writer.lock().await;
        let conn = guard.as_mut().ok_or(LinkError::NotConnected)?;

        let result = match timeout(self.shared.config.write_timeout, conn.sink.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LinkError::from(e)),
            Err(_) => Err(LinkError::Timeout("write")),
        };

        if let Err(ref e) = result {
            tracing::warn!(link = %self.shared.config.name, error = %e, "Send failed, dropping connection");
            if let Some(conn) = guard.take() {
                conn.token.cancel();
            }
        }
        result
    }

    /// Close the socket and end the loop
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(link = %self.config.name, from = %previous, to = %state, "Link state");
        }
    }

    async fn run<H>(&self, mut handler: H)
    where
        H: FnMut(Message),
    {
        let mut attempts: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.set_state(ConnectionState::Connecting);

            match self.connect().await {
                Ok(stream) => {
                    attempts = 0;
                    let result = self.serve(stream, &mut handler).await;
                    self.drop_connection().await;
                    match result {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(link = %self.config.name, addr = %self.config.addr, error = %e, "Link lost, reconnecting...");
                        }
                    }
                }
                Err(LinkError::Stopped) => break,
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        link = %self.config.name,
                        addr = %self.config.addr,
                        error = %e,
                        attempt = attempts,
                        backoff_ms = self.config.backoff.as_millis() as u64,
                        "Peer unavailable, retrying..."
                    );
                }
            }

            self.set_state(ConnectionState::Disconnected);
            increment(Counter::Reconnects);

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.backoff) => {}
            }
        }

        self.drop_connection().await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(link = %self.config.name, "Link stopped");
    }

    async fn connect(&self) -> Result<TcpStream, LinkError> {
        tracing::debug!(link = %self.config.name, addr = %self.config.addr, "Connecting");
        let attempt = timeout(
            self.config.connect_timeout,
            socket::connect(self.config.addr.as_str()),
        );

        tokio::select! {
            _ = self.cancel.cancelled() => Err(LinkError::Stopped),
            res = attempt => match res {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(LinkError::Connect(e)),
                Err(_) => Err(LinkError::Timeout("connect")),
            },
        }
    }

    /// Stream frames until the connection ends; `Ok` only when stopped
    async fn serve<H>(&self, stream: TcpStream, handler: &mut H) -> Result<(), LinkError>
    where
        H: FnMut(Message),
    {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        let token = self.cancel.child_token();
        let mut reader = FramedRead::new(read_half, self.codec.clone());

        *self.writer.lock().await = Some(Connection {
            sink: FramedWrite::new(write_half, self.codec.clone()),
            token: token.clone(),
        });
        self.set_state(ConnectionState::Connected);
        tracing::info!(link = %self.config.name, addr = %self.config.addr, "Link connected");

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    return if self.cancel.is_cancelled() {
                        Ok(())
                    } else {
                        Err(LinkError::Closed)
                    };
                }
                next = read_next(&mut reader, self.config.idle_timeout) => next?,
            };

            match next {
                Some(msg) => handler(msg),
                None => return Err(LinkError::Closed),
            }
        }
    }

    async fn drop_connection(&self) {
        if let Some(conn) = self.writer.lock().await.take() {
            conn.token.cancel();
        }
    }
}

async fn read_next(
    reader: &mut FramedRead<OwnedReadHalf, MessageCodec>,
    idle: Option<Duration>,
) -> Result<Option<Message>, LinkError> {
    let next = match idle {
        Some(limit) => timeout(limit, reader.next())
            .await
            .map_err(|_| LinkError::Timeout("read"))?,
        None => reader.next().await,
    };
    next.transpose().map_err(LinkError::from)
}
