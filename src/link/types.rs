//! Link types and configuration

use crate::config::LinkSettings;
use crate::protocol::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Reconnecting client configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// `host:port` to connect to
    pub addr: String,
    /// Label used in logs
    pub name: String,
    /// Fixed delay before every reconnection attempt
    pub backoff: Duration,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for a single framed write
    pub write_timeout: Duration,
    /// Drop the connection when nothing arrives for this long (`None` waits
    /// for the peer to close, for links that only send)
    pub idle_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            name: "link".to_string(),
            backoff: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl LinkConfig {
    /// Create a new config for the given address
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Create a config from the shared link settings
    pub fn from_settings(addr: impl Into<String>, settings: &LinkSettings) -> Self {
        Self::new(addr)
            .backoff(settings.backoff())
            .connect_timeout(settings.connect_timeout())
            .write_timeout(settings.io_timeout())
            .idle_timeout(Some(settings.io_timeout()))
    }

    /// Set the log label
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reconnection backoff
    pub fn backoff(mut self, d: Duration) -> Self {
        self.backoff = d;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, d: Duration) -> Self {
        self.write_timeout = d;
        self
    }

    /// Set the read idle timeout
    pub fn idle_timeout(mut self, d: Option<Duration>) -> Self {
        self.idle_timeout = d;
        self
    }
}

/// Connection state, written only by the client's own loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// Link I/O errors
///
/// Always recovered inside the client by reconnecting; `send` surfaces them
/// so the caller can decide whether to retry.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No live connection
    #[error("Not connected")]
    NotConnected,
    /// Connection attempt refused or failed
    #[error("Connection failed: {0}")]
    Connect(#[source] std::io::Error),
    /// A socket operation exceeded its timeout
    #[error("Timed out during {0}")]
    Timeout(&'static str),
    /// Peer closed the stream or the connection was torn down
    #[error("Connection closed")]
    Closed,
    /// Read or write failed
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Listener or socket setup failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The client was stopped
    #[error("Link stopped")]
    Stopped,
    /// The connect loop was already started
    #[error("Link already running")]
    AlreadyRunning,
}
