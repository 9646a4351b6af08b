//! End-to-end socket-level tests: real `TcpStream`s talking RESP against a
//! server bound to an ephemeral port, exercising the exact byte sequences
//! from the wire-protocol scenarios.

use glintdb::net::connection::CONNECTION_BUFFER_SIZE;
use glintdb::net::listener::BaseListener;
use glintdb::pool::BufferPool;
use glintdb::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Binds a server to an ephemeral port and spawns its accept loop, returning
/// the address clients can connect to and a handle that, once the returned
/// `broadcast::Sender` is dropped, tears the whole thing down.
async fn spawn_server(num_databases: u8) -> (std::net::SocketAddr, broadcast::Sender<()>) {
    let server = Arc::new(Server::new(num_databases));
    let pool = Arc::new(BufferPool::new(CONNECTION_BUFFER_SIZE, 2, 4));
    let (signal, _) = broadcast::channel(1);

    let listener = BaseListener::bind(server, pool, 0, signal.clone())
        .await
        .expect("bind to an ephemeral port");
    let addr = listener.local_addr().expect("local_addr");

    tokio::spawn(async move {
        listener.run().await;
    });

    (addr, signal)
}

async fn roundtrip(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream.write_all(request).await.expect("write request");
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.expect("read reply");
    buf.truncate(n);
    buf
}

#[tokio::test]
async fn ping() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(reply, b"+PONG\r\n".to_vec());
}

#[tokio::test]
async fn echo() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let reply = roundtrip(&mut stream, b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n").await;
    assert_eq!(reply, b"$5\r\nhello\r\n".to_vec());
}

#[tokio::test]
async fn set_then_get() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    let set_reply = roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").await;
    assert_eq!(set_reply, b"+OK\r\n".to_vec());

    let get_reply = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await;
    assert_eq!(get_reply, b"$3\r\nbar\r\n".to_vec());
}

#[tokio::test]
async fn set_with_px_then_get_after_expiry() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    let set_reply = roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$2\r\n50\r\n",
    )
    .await;
    assert_eq!(set_reply, b"+OK\r\n".to_vec());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let get_reply = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(get_reply, b"_\r\n".to_vec());
}

#[tokio::test]
async fn select_out_of_range() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let reply = roundtrip(&mut stream, b"*2\r\n$6\r\nSELECT\r\n$1\r\n9\r\n").await;
    assert_eq!(reply, b"-Invalid database index\r\n".to_vec());
}

#[tokio::test]
async fn malformed_request_keeps_connection_open() {
    let (addr, _signal) = spawn_server(1).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    let bad_reply = roundtrip(&mut stream, b"+PING\r\n").await;
    assert_eq!(bad_reply, b"-Unable to parse request\r\n".to_vec());

    // the connection must still be usable for a subsequent valid request
    let good_reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(good_reply, b"+PONG\r\n".to_vec());
}

#[tokio::test]
async fn select_isolation_across_independent_connections() {
    let (addr, _signal) = spawn_server(2).await;

    let mut a = TcpStream::connect(addr).await.expect("connect a");
    let mut b = TcpStream::connect(addr).await.expect("connect b");

    let select_reply = roundtrip(&mut a, b"*2\r\n$6\r\nSELECT\r\n$1\r\n1\r\n").await;
    assert_eq!(select_reply, b"+OK\r\n".to_vec());

    // b never selected db 1; its GET still runs against db 0 and a SET on a's
    // db 1 must not be visible there
    let set_reply = roundtrip(&mut a, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    assert_eq!(set_reply, b"+OK\r\n".to_vec());

    let miss_reply = roundtrip(&mut b, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(miss_reply, b"_\r\n".to_vec());
}
