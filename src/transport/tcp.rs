//! Listener binding and outbound connects.
//!
//! # Example
//!
//! ```ignore
//! use stdio_mux::transport::{bind_listener, connect_target};
//!
//! let listener = bind_listener("127.0.0.1", 8080, 100).await?;
//! let (stream, peer) = listener.accept().await?;
//! let upstream = connect_target("10.0.0.7", 22).await?;
//! ```

use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

use crate::error::{MuxError, Result};

/// Default accept backlog for the listening role.
pub const DEFAULT_ACCEPT_BACKLOG: u32 = 100;

/// Resolve `host:port` to the first matching socket address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| MuxError::config(format!("could not resolve {}:{}", host, port)))
}

/// Bind and listen on `host:port` with the given accept backlog.
pub async fn bind_listener(host: &str, port: u16, backlog: u32) -> Result<TcpListener> {
    let addr = resolve(host, port).await?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    let listener = socket.listen(backlog)?;
    tracing::info!(addr = %listener.local_addr()?, backlog, "listening");
    Ok(listener)
}

/// Open an outbound connection to the configured target.
pub async fn connect_target(host: &str, port: u16) -> std::io::Result<TcpStream> {
    TcpStream::connect((host, port)).await
}

/// Render a peer address as `ip:port`.
///
/// IPv6 addresses are not bracketed.
pub fn format_peer(addr: &SocketAddr) -> String {
    format!("{}:{}", addr.ip(), addr.port())
}
