//! TCP sockets with keepalive enabled
//!
//! Order links carry no traffic back to the sender and have no read idle
//! timeout. TCP keepalive is what eventually surfaces a peer that
//! vanished without a FIN or RST.

use std::io;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

const LISTEN_BACKLOG: u32 = 1024;

fn socket_for(addr: &SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(true)?;
    Ok(socket)
}

/// Connect to the first address `addr` resolves to that accepts
pub async fn connect(addr: &str) -> io::Result<TcpStream> {
    let mut last_err = None;
    for resolved in lookup_host(addr).await? {
        match socket_for(&resolved)?.connect(resolved).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{addr} resolved to no address"))
    }))
}

/// Bind a listener; accepted sockets inherit its keepalive setting
pub async fn listen(addr: &str) -> io::Result<TcpListener> {
    let resolved = lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{addr} resolved to no address"))
    })?;
    let socket = socket_for(&resolved)?;
    socket.set_reuseaddr(true)?;
    socket.bind(resolved)?;
    socket.listen(LISTEN_BACKLOG)
}
