//! Reconnecting client links
//!
//! Keeps a framed TCP link alive across producer restarts with a fixed,
//! configurable backoff. The loop has no terminal failure state; it ends
//! only when stopped.

mod client;
pub(crate) mod socket;
mod types;

pub use client::ReconnectingClient;
pub use types::{ConnectionState, LinkConfig, LinkError};
