//! Integration tests for stdio-mux.
//!
//! A listening endpoint and a connector endpoint are wired back to back
//! through in-memory pipes, with a loopback echo server as the target.

use std::net::SocketAddr;
use std::time::Duration;

use stdio_mux::{MuxBuilder, MuxError, Role};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Start a loopback echo server and return its port.
async fn echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    port
}

struct Tunnel {
    entry: SocketAddr,
    listen_task: JoinHandle<stdio_mux::error::Result<()>>,
    connect_task: JoinHandle<stdio_mux::error::Result<()>>,
}

/// Build a listening endpoint on an ephemeral port tunneled to `target_port`.
async fn tunnel(target_port: u16, non_blocking: bool) -> Tunnel {
    // listen → connect
    let (listen_out, connect_in) = duplex(256 * 1024);
    // connect → listen
    let (connect_out, listen_in) = duplex(256 * 1024);

    let mut listen = MuxBuilder::new("127.0.0.1", 0, Role::Listen);
    let mut connect = MuxBuilder::new("127.0.0.1", target_port, Role::Connect);
    if non_blocking {
        listen = listen.non_blocking_writes();
        connect = connect.non_blocking_writes();
    }

    let listen = listen.start_with(listen_in, listen_out).await.unwrap();
    let connect = connect.start_with(connect_in, connect_out).await.unwrap();
    let entry = listen.local_addr().unwrap();

    Tunnel {
        entry,
        listen_task: tokio::spawn(listen.run()),
        connect_task: tokio::spawn(connect.run()),
    }
}

async fn round_trip(entry: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(entry).await.unwrap();
    client.write_all(payload).await.unwrap();

    let mut received = vec![0u8; payload.len()];
    tokio::time::timeout(TIMEOUT, client.read_exact(&mut received))
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    received
}

#[tokio::test]
async fn test_echo_through_tunnel() {
    let port = echo_server().await;
    let tunnel = tunnel(port, false).await;

    let received = round_trip(tunnel.entry, b"hello through the tunnel").await;
    assert_eq!(received, b"hello through the tunnel");
}

#[tokio::test]
async fn test_binary_payload_through_tunnel() {
    let port = echo_server().await;
    let tunnel = tunnel(port, false).await;

    // Larger than one read chunk, every byte value including newlines
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 256) as u8).collect();
    let received = round_trip(tunnel.entry, &payload).await;
    assert_eq!(received, payload);
}

#[tokio::test]
async fn test_concurrent_connections_stay_separate() {
    let port = echo_server().await;
    let tunnel = tunnel(port, true).await;

    let clients: Vec<_> = (0..8u8)
        .map(|n| {
            let entry = tunnel.entry;
            tokio::spawn(async move {
                let payload = vec![n; 10_000];
                let received = round_trip(entry, &payload).await;
                assert_eq!(received, payload);
            })
        })
        .collect();

    for client in clients {
        tokio::time::timeout(TIMEOUT, client).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_client_close_propagates_to_target() {
    // Target that records what it receives and reports EOF
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = target.local_addr().unwrap().port();
    let tunnel = tunnel(port, false).await;

    let mut client = TcpStream::connect(tunnel.entry).await.unwrap();
    client.write_all(b"last words").await.unwrap();

    let (mut upstream, _) = tokio::time::timeout(TIMEOUT, target.accept())
        .await
        .unwrap()
        .unwrap();

    // Give the data frame a head start before the close
    let mut first = vec![0u8; 10];
    tokio::time::timeout(TIMEOUT, upstream.read_exact(&mut first))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, b"last words");

    drop(client);

    let mut rest = Vec::new();
    let n = tokio::time::timeout(TIMEOUT, upstream.read_to_end(&mut rest))
        .await
        .expect("target connection was not closed")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_target_close_propagates_to_client() {
    // Target that answers once then hangs up
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = target.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = target.accept().await.unwrap();
        stream.write_all(b"bye").await.unwrap();
    });

    let tunnel = tunnel(port, false).await;
    let mut client = TcpStream::connect(tunnel.entry).await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(TIMEOUT, client.read_to_end(&mut received))
        .await
        .expect("client connection was not closed")
        .unwrap();
    assert_eq!(received, b"bye");
}

#[tokio::test]
async fn test_unreachable_target_closes_client() {
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = target.local_addr().unwrap().port();
    drop(target);

    let tunnel = tunnel(port, false).await;
    let mut client = TcpStream::connect(tunnel.entry).await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(TIMEOUT, client.read_to_end(&mut received))
        .await
        .expect("client connection was not closed")
        .unwrap();
    assert!(received.is_empty());

    // Both endpoints keep running
    assert!(!tunnel.listen_task.is_finished());
    assert!(!tunnel.connect_task.is_finished());
}

#[tokio::test]
async fn test_session_ends_when_control_channel_closes() {
    let (ours, theirs) = duplex(1024);
    let (reader, writer) = tokio::io::split(ours);
    let reactor = MuxBuilder::new("127.0.0.1", 0, Role::Listen)
        .start_with(reader, writer)
        .await
        .unwrap();
    let entry = reactor.local_addr().unwrap();
    let task = tokio::spawn(reactor.run());

    let mut client = TcpStream::connect(entry).await.unwrap();
    drop(theirs);

    // Either the EOF is seen first, or announcing the client hits the
    // closed pipe; both end the session
    let result = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
    match result {
        Err(MuxError::ControlChannelClosed) | Err(MuxError::Io(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    // Live connections are closed with the session
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(TIMEOUT, client.read_to_end(&mut buf))
        .await
        .expect("client connection was not closed");
}
