//! TCP servers
//!
//! [`BroadcastServer`] pushes framed messages from a per-connection source
//! to every subscriber. [`IngestServer`] receives framed orders.

mod broadcast;
mod ingest;

pub use broadcast::BroadcastServer;
pub use ingest::IngestServer;
