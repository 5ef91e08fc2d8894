//! Pipeline metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

/// Monotonic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Frames decoded into messages
    FramesDecoded,
    /// Frames dropped as malformed or over-long
    FramesDropped,
    /// Reconnecting client connect attempts that failed or links that dropped
    Reconnects,
    /// Orders written to the order link
    OrdersSent,
    /// Orders that could not be written
    OrdersFailed,
    /// Price cache slot writes
    CacheUpdates,
    /// Connections accepted by a server
    ConnectionsAccepted,
}

/// Point-in-time gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    /// Connections currently served
    ActiveConnections,
    /// Latest sentiment seen by the strategy
    Sentiment,
}

impl Counter {
    fn name(self) -> &'static str {
        match self {
            Counter::FramesDecoded => "tickwire_frames_decoded_total",
            Counter::FramesDropped => "tickwire_frames_dropped_total",
            Counter::Reconnects => "tickwire_reconnects_total",
            Counter::OrdersSent => "tickwire_orders_sent_total",
            Counter::OrdersFailed => "tickwire_orders_failed_total",
            Counter::CacheUpdates => "tickwire_cache_updates_total",
            Counter::ConnectionsAccepted => "tickwire_connections_accepted_total",
        }
    }
}

impl Gauge {
    fn name(self) -> &'static str {
        match self {
            Gauge::ActiveConnections => "tickwire_active_connections",
            Gauge::Sentiment => "tickwire_sentiment",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: Counter) {
    metrics::counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: Gauge, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Add `delta` (possibly negative) to a gauge
pub fn adjust_gauge(metric: Gauge, delta: f64) {
    metrics::gauge!(metric.name()).increment(delta);
}
