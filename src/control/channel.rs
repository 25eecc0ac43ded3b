//! Reader and writer halves of the control channel.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{MuxError, Result};
use crate::protocol::{encode_line, Frame};

/// Default number of lines buffered between the reader task and the reactor.
pub const DEFAULT_LINE_CAPACITY: usize = 64;

type LineResult = std::io::Result<Vec<u8>>;

/// Receiving half of the control channel.
///
/// Lines are read by a dedicated task; [`ControlReader::next_line`] only
/// waits on a channel and can be used as a `select!` branch.
pub struct ControlReader {
    rx: mpsc::Receiver<LineResult>,
    task: JoinHandle<()>,
}

impl ControlReader {
    /// Spawn the line reader task over `reader`.
    pub fn spawn<R>(reader: R, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(read_lines(BufReader::new(reader), tx));
        Self { rx, task }
    }

    /// Wait for the next raw line, without its terminator.
    ///
    /// Cancel-safe.
    ///
    /// # Errors
    ///
    /// - [`MuxError::ControlChannelClosed`] once the stream reaches EOF
    /// - [`MuxError::Io`] if reading the stream failed
    pub async fn next_line(&mut self) -> Result<Vec<u8>> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(MuxError::Io(e)),
            None => Err(MuxError::ControlChannelClosed),
        }
    }
}

impl Drop for ControlReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read newline-terminated lines until EOF or error.
///
/// A final line without terminator is still delivered.
async fn read_lines<R>(mut reader: BufReader<R>, tx: mpsc::Sender<LineResult>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => return,
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                if tx.send(Ok(line)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }
}

/// Sending half of the control channel.
///
/// Writes are synchronous from the reactor's point of view: each frame is
/// written and flushed before `send` returns.
pub struct ControlWriter<W> {
    writer: W,
    frames_sent: u64,
}

impl<W: AsyncWrite + Unpin> ControlWriter<W> {
    /// Wrap an async writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_sent: 0,
        }
    }

    /// Write one frame as a single line and flush.
    ///
    /// # Errors
    ///
    /// Any error here is a control-channel failure and is fatal to the session.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let line = encode_line(frame)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        self.frames_sent += 1;
        tracing::trace!(id = frame.id, kind = %frame.kind, bytes = frame.payload_len(), "frame sent");
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}
