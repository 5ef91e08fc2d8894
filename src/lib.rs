//! tickwire: streaming market data pipeline
//!
//! This library provides the core components for:
//! - Delimiter-framed message channels over TCP
//! - A price cache shared between processes through a mapped region
//! - Client links that reconnect with a fixed backoff
//! - Broadcast servers with isolated per-subscriber writers
//! - A moving-average + sentiment signal engine
//! - Order routing and ingestion
//! - Structured logging and metrics

pub mod cache;
pub mod cli;
pub mod config;
pub mod execution;
pub mod link;
pub mod protocol;
pub mod server;
pub mod signal;
pub mod source;
pub mod telemetry;
