//! Configuration types for tickwire
//!
//! Values come from an optional TOML file, then environment variables
//! override the endpoint, cache and delimiter settings.

use crate::protocol::{Delimiter, InvalidDelimiter, MessageCodec, DEFAULT_MAX_FRAME_LENGTH};
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for [`Config`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Environment override could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    /// Delimiter setting rejected
    #[error(transparent)]
    Delimiter(#[from] InvalidDelimiter),
    /// A setting is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// A cache attacher was started without a region name
    #[error("Price cache name missing: pass --cache-name or set PRICEBOOK_NAME")]
    MissingCacheName,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub order_manager: OrderManagerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host the gateway binds and feed clients connect to
    pub host: String,
    pub price_port: u16,
    pub news_port: u16,
    /// Host of the order manager
    pub order_host: String,
    pub order_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            price_port: 7001,
            news_port: 7002,
            order_host: "localhost".to_string(),
            order_port: 7003,
        }
    }
}

impl NetworkConfig {
    /// Price broadcast address
    pub fn price_addr(&self) -> String {
        format!("{}:{}", self.host, self.price_port)
    }

    /// News broadcast address
    pub fn news_addr(&self) -> String {
        format!("{}:{}", self.host, self.news_port)
    }

    /// Order ingestion address
    pub fn order_addr(&self) -> String {
        format!("{}:{}", self.order_host, self.order_port)
    }
}

/// Wire framing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Single-character frame delimiter
    pub delimiter: String,
    /// Largest accepted payload in bytes
    pub max_frame_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            delimiter: "*".to_string(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ProtocolConfig {
    /// Build a codec for these settings
    pub fn codec(&self) -> Result<MessageCodec, ConfigError> {
        let delimiter = Delimiter::parse(&self.delimiter)?;
        Ok(MessageCodec::new(delimiter).max_frame_length(self.max_frame_length))
    }
}

/// Reconnect and socket timeout settings shared by every link
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Fixed delay before a reconnection attempt
    pub backoff_ms: u64,
    pub connect_timeout_ms: u64,
    /// Write timeout, and read idle timeout for feed links
    pub io_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            backoff_ms: 3000,
            connect_timeout_ms: 5000,
            io_timeout_ms: 5000,
        }
    }
}

impl LinkSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Shared price cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache regions (tmpfs preferred)
    pub region_dir: PathBuf,
    /// Region name; generated by the creator when absent
    pub name: Option<String>,
    /// Symbol order of the region
    pub symbols: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            region_dir: default_region_dir(),
            name: None,
            symbols: vec!["AAPL".to_string(), "MSFT".to_string(), "AMZN".to_string()],
        }
    }
}

fn default_region_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// Synthetic data producer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub price_interval_ms: u64,
    pub news_interval_ms: u64,
    /// GBM drift per unit time
    pub drift: f64,
    /// GBM volatility per unit time
    pub volatility: f64,
    /// Initial prices are drawn uniformly from `[initial_price_min, initial_price_max)`
    pub initial_price_min: f64,
    pub initial_price_max: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            price_interval_ms: 100,
            news_interval_ms: 500,
            drift: 0.0001,
            volatility: 0.01,
            initial_price_min: 100.0,
            initial_price_max: 300.0,
        }
    }
}

/// Signal engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub poll_interval_ms: u64,
    /// Sentiment strictly above this is bullish
    pub bullish_threshold: u8,
    /// Sentiment strictly below this is bearish
    pub bearish_threshold: u8,
    pub order_qty: u32,
    pub status_interval_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            poll_interval_ms: 200,
            bullish_threshold: 60,
            bearish_threshold: 40,
            order_qty: 10,
            status_interval_ms: 2000,
        }
    }
}

/// Order manager configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderManagerConfig {
    /// Append every received order as a JSON line here
    pub trade_log: Option<PathBuf>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file if present, apply process environment overrides, validate
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GATEWAY_HOST") {
            self.network.host = host;
        }
        if let Some(port) = parse_env(&lookup, "GATEWAY_PRICE_PORT")? {
            self.network.price_port = port;
        }
        if let Some(port) = parse_env(&lookup, "GATEWAY_NEWS_PORT")? {
            self.network.news_port = port;
        }
        if let Some(host) = lookup("ORDERMANAGER_HOST") {
            self.network.order_host = host;
        }
        if let Some(port) = parse_env(&lookup, "ORDERMANAGER_PORT")? {
            self.network.order_port = port;
        }
        if let Some(name) = lookup("PRICEBOOK_NAME") {
            self.cache.name = Some(name);
        }
        if let Some(dir) = lookup("PRICEBOOK_DIR") {
            self.cache.region_dir = PathBuf::from(dir);
        }
        if let Some(delimiter) = lookup("MESSAGE_DELIMITER") {
            self.protocol.delimiter = delimiter;
        }
        Ok(())
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let net = &self.network;
        if net.host.trim().is_empty() || net.order_host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if net.price_port == 0 || net.news_port == 0 || net.order_port == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".into()));
        }

        Delimiter::parse(&self.protocol.delimiter)?;
        if self.protocol.max_frame_length == 0 {
            return Err(ConfigError::Invalid("max_frame_length must be positive".into()));
        }

        if self.link.backoff_ms == 0
            || self.link.connect_timeout_ms == 0
            || self.link.io_timeout_ms == 0
        {
            return Err(ConfigError::Invalid(
                "link backoff and timeouts must be positive".into(),
            ));
        }

        if self.cache.symbols.is_empty() {
            return Err(ConfigError::Invalid("at least one symbol is required".into()));
        }
        let mut seen = HashSet::new();
        for symbol in &self.cache.symbols {
            if !seen.insert(symbol) {
                return Err(ConfigError::Invalid(format!("duplicate symbol {symbol}")));
            }
        }

        let sig = &self.signal;
        if sig.short_window == 0 || sig.short_window > sig.long_window {
            return Err(ConfigError::Invalid(format!(
                "windows must satisfy 0 < short ({}) <= long ({})",
                sig.short_window, sig.long_window
            )));
        }
        if sig.bullish_threshold > 100 || sig.bearish_threshold > sig.bullish_threshold {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy bearish ({}) <= bullish ({}) <= 100",
                sig.bearish_threshold, sig.bullish_threshold
            )));
        }
        if sig.poll_interval_ms == 0
            || sig.status_interval_ms == 0
            || self.gateway.price_interval_ms == 0
            || self.gateway.news_interval_ms == 0
        {
            return Err(ConfigError::Invalid("intervals must be positive".into()));
        }
        if self.gateway.initial_price_min <= 0.0
            || self.gateway.initial_price_min >= self.gateway.initial_price_max
        {
            return Err(ConfigError::Invalid("initial price range is empty".into()));
        }

        Ok(())
    }
}

fn parse_env<F>(lookup: &F, var: &'static str) -> Result<Option<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        None => Ok(None),
    }
}
