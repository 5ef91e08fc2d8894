//! Integration tests over real sockets and mapped regions

mod broadcast;
mod cache;
mod e2e;
mod engine;
mod framing;
mod link;
