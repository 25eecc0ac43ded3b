//! Multiplexer builder and reactor loop.
//!
//! The [`MuxBuilder`] provides a fluent API for configuring the endpoint.
//! The [`Reactor`] owns every resource of the session:
//! 1. The control channel (reader and writer halves)
//! 2. The listener socket, in the listening role
//! 3. The registry of live connections and their outbound queues
//!
//! Each [`Reactor::turn`] waits until one source is ready and dispatches it:
//! a control-channel line, a pending accept, a connection read event, or
//! write readiness for the connections whose queues are non-empty.
//!
//! # Example
//!
//! ```ignore
//! use stdio_mux::{MuxBuilder, Role};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reactor = MuxBuilder::new("0.0.0.0", 8080, Role::Listen)
//!         .non_blocking_writes()
//!         .start()
//!         .await?;
//!
//!     reactor.run().await?;
//!     Ok(())
//! }
//! ```

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::task::Poll;

use tokio::io::{AsyncRead, AsyncWrite, Stdout};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::{MalformedPolicy, MuxConfig, Role, WriteMode};
use crate::control::{stdio, ControlReader, ControlWriter};
use crate::error::{MuxError, Result};
use crate::protocol::{decode_line, ConnId, Frame, FrameKind};
use crate::registry::{Registry, Token};
use crate::transport::{bind_listener, connect_target, format_peer, ConnEvent, Connection};

/// Builder for configuring and starting a multiplexer endpoint.
pub struct MuxBuilder {
    config: MuxConfig,
}

impl MuxBuilder {
    /// Create a new builder for the given address and role.
    pub fn new(host: impl Into<String>, port: u16, role: Role) -> Self {
        Self {
            config: MuxConfig::new(host, port, role),
        }
    }

    /// Create a builder from an existing configuration.
    pub fn from_config(config: MuxConfig) -> Self {
        Self { config }
    }

    /// Set the listener accept backlog.
    ///
    /// Default: 100
    pub fn accept_backlog(mut self, backlog: u32) -> Self {
        self.config.accept_backlog = backlog;
        self
    }

    /// Set the maximum bytes read from a connection at once.
    ///
    /// Default: 4096
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the socket write strategy.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    /// Use non-blocking writes with requeueing of partial writes.
    pub fn non_blocking_writes(self) -> Self {
        self.write_mode(WriteMode::NonBlocking)
    }

    /// Set the handling of undecodable control-channel lines.
    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.config.malformed_policy = policy;
        self
    }

    /// Set the capacity of the connection event channel.
    ///
    /// Default: 1024
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Set the number of control-channel lines buffered ahead of the reactor.
    ///
    /// Default: 64
    pub fn line_capacity(mut self, capacity: usize) -> Self {
        self.config.line_capacity = capacity;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Start the endpoint over the process's stdin and stdout.
    pub async fn start(self) -> Result<Reactor<Stdout>> {
        self.config.validate()?;
        let (reader, writer) = stdio(self.config.line_capacity);
        Reactor::start(self.config, reader, writer).await
    }

    /// Start the endpoint over an arbitrary duplex control channel.
    pub async fn start_with<R, W>(self, reader: R, writer: W) -> Result<Reactor<W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        self.config.validate()?;
        let reader = ControlReader::spawn(reader, self.config.line_capacity);
        Reactor::start(self.config, reader, ControlWriter::new(writer)).await
    }
}

/// What woke the reactor up.
enum Ready {
    Line(Result<Vec<u8>>),
    Accept(std::io::Result<(TcpStream, SocketAddr)>),
    Conn(ConnEvent),
    Write,
}

/// A running multiplexer endpoint.
pub struct Reactor<W> {
    config: MuxConfig,
    control_in: ControlReader,
    control_out: ControlWriter<W>,
    listener: Option<TcpListener>,
    registry: Registry<Connection>,
    events_tx: mpsc::Sender<ConnEvent>,
    events_rx: mpsc::Receiver<ConnEvent>,
}

impl<W: AsyncWrite + Unpin> Reactor<W> {
    async fn start(
        config: MuxConfig,
        control_in: ControlReader,
        control_out: ControlWriter<W>,
    ) -> Result<Self> {
        let listener = match config.role {
            Role::Listen => {
                Some(bind_listener(&config.host, config.port, config.accept_backlog).await?)
            }
            Role::Connect => None,
        };

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);

        tracing::info!(
            role = ?config.role,
            host = %config.host,
            port = config.port,
            write_mode = ?config.write_mode,
            "multiplexer started"
        );

        Ok(Self {
            config,
            control_in,
            control_out,
            listener,
            registry: Registry::new(),
            events_tx,
            events_rx,
        })
    }

    /// Address the listener is bound to, in the listening role.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// The connection registry.
    pub fn registry(&self) -> &Registry<Connection> {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Number of frames written to the control channel so far.
    pub fn frames_sent(&self) -> u64 {
        self.control_out.frames_sent()
    }

    /// Run until the control channel fails.
    ///
    /// Never returns `Ok`. A clean end of the control channel yields
    /// [`MuxError::ControlChannelClosed`].
    pub async fn run(mut self) -> Result<()> {
        loop {
            if let Err(e) = self.turn().await {
                if e.is_session_end() {
                    tracing::info!(connections = self.registry.len(), "control channel closed");
                } else {
                    tracing::error!(error = %e, "multiplexer stopped");
                }
                self.shutdown().await;
                return Err(e);
            }
        }
    }

    /// Wait for one ready source and dispatch it.
    ///
    /// # Errors
    ///
    /// Only control-channel failures and (under [`MalformedPolicy::Fatal`])
    /// malformed frames are returned; connection-local failures are handled
    /// by tearing the connection down.
    pub async fn turn(&mut self) -> Result<()> {
        let write_wait = WriteWait::of(&self.registry, self.config.write_mode);

        let ready = tokio::select! {
            line = self.control_in.next_line() => Ready::Line(line),
            accepted = accept(self.listener.as_ref()) => Ready::Accept(accepted),
            Some(event) = self.events_rx.recv() => Ready::Conn(event),
            _ = write_wait.ready() => Ready::Write,
        };

        match ready {
            Ready::Line(line) => self.on_control_line(line?).await,
            Ready::Accept(Ok((stream, addr))) => self.on_accept(stream, addr).await,
            Ready::Accept(Err(e)) => {
                tracing::warn!(error = %e, "accept failed");
                Ok(())
            }
            Ready::Conn(event) => self.on_conn_event(event).await,
            Ready::Write => self.on_write_ready().await,
        }
    }

    /// Decode one control-channel line and dispatch it.
    async fn on_control_line(&mut self, line: Vec<u8>) -> Result<()> {
        let frame = match std::str::from_utf8(&line)
            .map_err(|e| MuxError::malformed(format!("line is not UTF-8: {}", e)))
            .and_then(decode_line)
        {
            Ok(frame) => frame,
            Err(e) => match self.config.malformed_policy {
                MalformedPolicy::Fatal => return Err(e),
                MalformedPolicy::SkipAndLog => {
                    tracing::warn!(error = %e, "skipping malformed control line");
                    return Ok(());
                }
            },
        };

        tracing::debug!(id = frame.id, kind = %frame.kind, bytes = frame.payload_len(), "frame received");

        match frame.kind {
            FrameKind::Open => self.open_outbound(frame).await,
            FrameKind::Data | FrameKind::Close => {
                let id = frame.id;
                let kind = frame.kind;
                if let Err(e) = self.registry.enqueue(id, frame) {
                    tracing::debug!(%kind, error = %e, "dropping frame");
                }
                Ok(())
            }
        }
    }

    /// Open an outbound connection for a peer-announced id.
    async fn open_outbound(&mut self, frame: Frame) -> Result<()> {
        let id = frame.id;
        let origin = frame.peer_text().unwrap_or_default();

        if self.registry.contains_id(id) {
            tracing::warn!(id, origin = %origin, "ignoring open for an id that is already registered");
            return Ok(());
        }

        let stream = match connect_target(&self.config.host, self.config.port).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(id, error = %e, "connect to target failed");
                return self.control_out.send(&Frame::close(id)).await;
            }
        };

        let token = self.registry.next_token();
        let conn = match Connection::spawn(
            stream,
            token,
            self.config.chunk_size,
            self.events_tx.clone(),
        ) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(id, error = %e, "outbound connection unusable");
                return self.control_out.send(&Frame::close(id)).await;
            }
        };
        let target = conn.peer();

        match self.registry.register_with_id(id, token, conn) {
            Ok(_) => {
                tracing::info!(id, origin = %origin, target = %target, "connection opened");
            }
            Err(e) => tracing::warn!(id, error = %e, "registration failed"),
        }
        Ok(())
    }

    /// Register an accepted connection and announce it.
    async fn on_accept(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let token = self.registry.next_token();
        let conn = match Connection::spawn(
            stream,
            token,
            self.config.chunk_size,
            self.events_tx.clone(),
        ) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "dropping accepted connection");
                return Ok(());
            }
        };

        let id = self.registry.register_accepted(token, conn);
        tracing::info!(id, peer = %addr, "connection accepted");

        self.control_out
            .send(&Frame::open(id, &format_peer(&addr)))
            .await
    }

    /// Relay a connection read event.
    async fn on_conn_event(&mut self, event: ConnEvent) -> Result<()> {
        match event {
            ConnEvent::Data { token, data } => match self.registry.lookup_by_token(token) {
                Some(id) => {
                    tracing::debug!(id, bytes = data.len(), "relaying to control channel");
                    self.control_out.send(&Frame::data(id, data)).await
                }
                None => {
                    tracing::trace!(%token, "data from a connection already torn down");
                    Ok(())
                }
            },
            ConnEvent::Eof { token } => self.teardown_local(token, None).await,
            ConnEvent::Error { token, error } => self.teardown_local(token, Some(error)).await,
        }
    }

    /// Deliver the front frame of every write-interested connection.
    async fn on_write_ready(&mut self) -> Result<()> {
        for id in self.registry.write_interest() {
            let Some(frame) = self.registry.dequeue(id) else {
                continue;
            };

            match frame.kind {
                FrameKind::Close => {
                    if let Some((_, conn)) = self.registry.unregister_id(id) {
                        conn.close().await;
                        tracing::info!(id, "connection closed by peer");
                    }
                }
                FrameKind::Data => self.deliver(id, frame).await?,
                FrameKind::Open => {}
            }
        }
        Ok(())
    }

    /// Write one data frame to its socket.
    async fn deliver(&mut self, id: ConnId, frame: Frame) -> Result<()> {
        let mode = self.config.write_mode;
        let Some(conn) = self.registry.lookup_by_id_mut(id) else {
            return Ok(());
        };

        let result = match mode {
            WriteMode::Blocking => conn.write_all(&frame.payload).await,
            WriteMode::NonBlocking => {
                let attempt = conn.try_write(&frame.payload);
                self.requeue_unwritten(id, frame, attempt)
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => match self.registry.token_of(id) {
                Some(token) => self.teardown_local(token, Some(e)).await,
                None => Ok(()),
            },
        }
    }

    /// Requeue whatever a non-blocking write left unwritten.
    fn requeue_unwritten(
        &mut self,
        id: ConnId,
        frame: Frame,
        attempt: std::io::Result<usize>,
    ) -> std::io::Result<()> {
        match attempt {
            Ok(n) if n >= frame.payload_len() => Ok(()),
            Ok(n) => {
                let rest = Frame::data(id, frame.payload.slice(n..));
                self.registry.requeue_front(id, rest);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                self.registry.requeue_front(id, frame);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Tear down a connection because of a local socket condition and tell
    /// the peer. A no-op if the connection is already gone.
    async fn teardown_local(&mut self, token: Token, error: Option<std::io::Error>) -> Result<()> {
        let Some((id, conn)) = self.registry.unregister(token) else {
            return Ok(());
        };

        match &error {
            Some(e) => tracing::warn!(id, peer = %conn.peer(), error = %e, "connection failed"),
            None => tracing::info!(id, peer = %conn.peer(), "connection closed"),
        }
        conn.close().await;

        self.control_out.send(&Frame::close(id)).await
    }

    /// Close every connection. No frames are sent.
    async fn shutdown(&mut self) {
        for (_, conn) in self.registry.drain() {
            conn.close().await;
        }
    }
}

async fn accept(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

/// When the next write pass may run.
enum WriteWait<'a> {
    /// No queued frames.
    Idle,
    /// A pass can run right away.
    Now,
    /// Wait until one of these sockets is writable.
    Writable(Vec<&'a Connection>),
}

impl<'a> WriteWait<'a> {
    fn of(registry: &'a Registry<Connection>, mode: WriteMode) -> Self {
        let ids = registry.write_interest();
        if ids.is_empty() {
            return WriteWait::Idle;
        }

        // A queued close needs no socket space
        let close_ready = ids
            .iter()
            .any(|&id| registry.front(id).is_some_and(Frame::is_close));
        if mode == WriteMode::Blocking || close_ready {
            return WriteWait::Now;
        }

        WriteWait::Writable(
            ids.iter()
                .filter_map(|&id| registry.lookup_by_id(id))
                .collect(),
        )
    }

    async fn ready(self) {
        match self {
            WriteWait::Idle => std::future::pending().await,
            WriteWait::Now => {}
            WriteWait::Writable(conns) => {
                std::future::poll_fn(|cx| {
                    if conns.iter().any(|conn| conn.poll_writable(cx).is_ready()) {
                        Poll::Ready(())
                    } else {
                        Poll::Pending
                    }
                })
                .await
            }
        }
    }
}
