//! A registered TCP connection.
//!
//! The socket is split: the reactor keeps the write half, and a reader task
//! owns the read half. The task reads up to `chunk_size` bytes at a time and
//! forwards each result as a [`ConnEvent`] tagged with the socket's token.
//!
//! ```text
//! socket read half ─► reader task ─► mpsc<ConnEvent> ─► Reactor
//! Reactor ─► registry queue ─► write half ─► socket
//! ```

use std::net::SocketAddr;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::Token;

/// Default read chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Readiness event produced by a connection's reader task.
#[derive(Debug)]
pub enum ConnEvent {
    /// Bytes read from the socket.
    Data {
        /// Socket that produced the bytes.
        token: Token,
        /// Up to `chunk_size` bytes.
        data: Bytes,
    },
    /// The socket returned end-of-stream.
    Eof {
        /// Socket that closed.
        token: Token,
    },
    /// Reading the socket failed.
    Error {
        /// Socket that failed.
        token: Token,
        /// The read error.
        error: std::io::Error,
    },
}

/// A live TCP connection owned by the registry.
pub struct Connection {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
    peer: SocketAddr,
}

impl Connection {
    /// Split `stream` and spawn its reader task.
    pub fn spawn(
        stream: TcpStream,
        token: Token,
        chunk_size: usize,
        events: mpsc::Sender<ConnEvent>,
    ) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (read_half, writer) = stream.into_split();
        let reader = tokio::spawn(read_loop(read_half, token, chunk_size.max(1), events));

        Ok(Self {
            writer,
            reader,
            peer,
        })
    }

    /// Address of the remote end.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write the whole buffer, waiting as long as it takes.
    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data).await
    }

    /// Try a single non-blocking write.
    ///
    /// Returns the number of bytes written; `WouldBlock` if none fit.
    pub fn try_write(&self, data: &[u8]) -> std::io::Result<usize> {
        self.writer.try_write(data)
    }

    /// Poll whether the socket can take more bytes.
    ///
    /// Readiness is cleared by a `try_write` that hits `WouldBlock`, so a
    /// stalled socket stays pending until the peer drains it. Errors count
    /// as ready: the next write reports them.
    pub fn poll_writable(&self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.writer.as_ref().poll_write_ready(cx)
    }

    /// Close the connection: shut down the write side and stop the reader.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
        self.reader.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Read chunks until EOF or error, forwarding each as an event.
async fn read_loop(
    mut reader: OwnedReadHalf,
    token: Token,
    chunk_size: usize,
    events: mpsc::Sender<ConnEvent>,
) {
    let mut buf = vec![0u8; chunk_size];

    loop {
        let event = match reader.read(&mut buf).await {
            Ok(0) => ConnEvent::Eof { token },
            Ok(n) => ConnEvent::Data {
                token,
                data: Bytes::copy_from_slice(&buf[..n]),
            },
            Err(error) => ConnEvent::Error { token, error },
        };

        let last = !matches!(event, ConnEvent::Data { .. });
        if events.send(event).await.is_err() || last {
            return;
        }
    }
}
