//! Stdio control channel.
//!
//! # Important
//!
//! - **stdin**: frames from the peer (one per line)
//! - **stdout**: frames to the peer (one per line, flushed per frame)
//! - **stderr**: logs, never parsed by the peer
//! - **Never use `println!`**: anything else on stdout corrupts the channel

use tokio::io::{Stdin, Stdout};

use super::channel::{ControlReader, ControlWriter};

/// Open the control channel over the process's stdin and stdout.
pub fn stdio(capacity: usize) -> (ControlReader, ControlWriter<Stdout>) {
    let reader = ControlReader::spawn::<Stdin>(tokio::io::stdin(), capacity);
    let writer = ControlWriter::new(tokio::io::stdout());
    (reader, writer)
}
