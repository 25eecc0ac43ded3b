//! # stdio-mux
//!
//! Multiplex any number of TCP connections over a single duplex byte
//! stream, by default the process's stdin/stdout.
//!
//! One endpoint runs in the **listening** role: it accepts TCP connections
//! and announces each one on the control channel. The other runs in the
//! **connector** role: for every announced connection it opens a TCP
//! connection to its configured target and relays bytes both ways.
//!
//! ## Architecture
//!
//! - **Control channel** (stdio): one JSON frame per line, base-64 payloads
//! - **Registry**: id↔socket maps plus one FIFO outbound queue per connection
//! - **Reactor**: a single loop owning every socket and dispatching readiness
//!
//! ```text
//! TCP clients ─► [listen] ══ control channel ══ [connect] ─► target
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use stdio_mux::{MuxBuilder, Role};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reactor = MuxBuilder::new("127.0.0.1", 22, Role::Connect)
//!         .start()
//!         .await?;
//!
//!     reactor.run().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

mod reactor;

pub use config::{MalformedPolicy, MuxConfig, Role, WriteMode};
pub use error::MuxError;
pub use reactor::{MuxBuilder, Reactor};
