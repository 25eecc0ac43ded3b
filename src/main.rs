//! stdio-mux command-line entry point.
//!
//! Usage: stdio-mux <HOST> <PORT> <ROLE> [OPTIONS]
//!
//! stdout carries the control channel, so logs go to stderr.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stdio_mux::{MalformedPolicy, MuxBuilder, Role};

/// Multiplex TCP connections over stdin/stdout.
#[derive(Parser)]
#[command(name = "stdio-mux")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind host (server role) or target host (any other role).
    host: String,

    /// Bind port (server role) or target port (any other role).
    port: u16,

    /// "server" accepts connections; anything else only connects.
    role: String,

    /// Write to sockets without blocking, requeueing partial writes.
    #[arg(long)]
    non_blocking_writes: bool,

    /// Log and skip undecodable control lines instead of exiting.
    #[arg(long)]
    skip_malformed: bool,

    /// Listener accept backlog.
    #[arg(long, default_value_t = stdio_mux::transport::DEFAULT_ACCEPT_BACKLOG)]
    backlog: u32,

    /// Maximum bytes read from a connection at once.
    #[arg(long, default_value_t = stdio_mux::transport::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_tracing(args.verbose);

    let mut builder = MuxBuilder::new(args.host, args.port, Role::from_arg(&args.role))
        .accept_backlog(args.backlog)
        .chunk_size(args.chunk_size);
    if args.non_blocking_writes {
        builder = builder.non_blocking_writes();
    }
    if args.skip_malformed {
        builder = builder.malformed_policy(MalformedPolicy::SkipAndLog);
    }

    // Single-threaded: the reactor is the only thing touching sockets
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(builder));

    // A blocking stdin read may still be pending
    runtime.shutdown_background();
    result
}

async fn run(builder: MuxBuilder) -> anyhow::Result<()> {
    let reactor = builder.start().await?;
    match reactor.run().await {
        Err(e) if e.is_session_end() => Ok(()),
        Err(e) => Err(e.into()),
        Ok(()) => Ok(()),
    }
}

fn setup_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
