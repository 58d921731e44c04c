//! Modbus TCP coil server over a loopback socket
//!
//! Opens a local listener on an ephemeral port.

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shm_rtdb::{CoilDatastore, CoilMap, CoilStore, MemoryRegionProvider, SharedRegionGateway};
use shmbridge::{CoilServer, SyncEngine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

async fn start(store: Arc<CoilStore>, unit_id: Option<u8>) -> (SocketAddr, CancellationToken) {
    let token = CancellationToken::new();
    let (addr, _handle) = CoilServer::new(store)
        .with_unit_id(unit_id)
        .start("127.0.0.1:0", token.clone())
        .await
        .unwrap();
    (addr, token)
}

/// Send one request PDU and return the response PDU
async fn transact(stream: &mut TcpStream, tid: u16, unit: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&tid.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&(pdu.len() as u16 + 1).to_be_bytes());
    frame.push(unit);
    frame.extend_from_slice(pdu);
    stream.write_all(&frame).await.unwrap();

    let mut header = [0u8; 7];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(u16::from_be_bytes([header[0], header[1]]), tid);
    assert_eq!(header[6], unit);

    let len = u16::from_be_bytes([header[4], header[5]]) as usize - 1;
    let mut response = vec![0u8; len];
    stream.read_exact(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_read_and_write_coils() {
    let store = Arc::new(CoilStore::new(200));
    let (addr, token) = start(Arc::clone(&store), None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Write single coil 32 on
    let response = transact(&mut stream, 1, 1, &[0x05, 0x00, 0x20, 0xFF, 0x00]).await;
    assert_eq!(response, vec![0x05, 0x00, 0x20, 0xFF, 0x00]);

    // Write coils 40..48 = 0b1010_0101
    let response = transact(&mut stream, 2, 1, &[0x0F, 0x00, 0x28, 0x00, 0x08, 0x01, 0xA5]).await;
    assert_eq!(response, vec![0x0F, 0x00, 0x28, 0x00, 0x08]);

    // Read back the manual control zone
    let response = transact(&mut stream, 3, 1, &[0x01, 0x00, 0x20, 0x00, 0x10]).await;
    assert_eq!(response, vec![0x01, 0x02, 0x01, 0xA5]);

    assert!(store.get_range(32, 1).unwrap()[0]);
    token.cancel();
}

#[tokio::test]
async fn test_exceptions() {
    let store = Arc::new(CoilStore::new(200));
    let (addr, token) = start(store, None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Read holding registers is not served
    let response = transact(&mut stream, 1, 1, &[0x03, 0x00, 0x00, 0x00, 0x01]).await;
    assert_eq!(response, vec![0x83, 0x01]);

    // Past the end of the coil space
    let response = transact(&mut stream, 2, 1, &[0x01, 0x00, 0xC7, 0x00, 0x02]).await;
    assert_eq!(response, vec![0x81, 0x02]);

    // Bad coil value
    let response = transact(&mut stream, 3, 1, &[0x05, 0x00, 0x20, 0x00, 0x01]).await;
    assert_eq!(response, vec![0x85, 0x03]);

    // Connection still usable after exceptions
    let response = transact(&mut stream, 4, 1, &[0x01, 0x00, 0x00, 0x00, 0x01]).await;
    assert_eq!(response, vec![0x01, 0x01, 0x00]);
    token.cancel();
}

#[tokio::test]
async fn test_unit_id_filter() {
    let store = Arc::new(CoilStore::new(200));
    let (addr, token) = start(store, Some(7)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // A request for another unit gets no answer; the next one for unit 7 does
    let mut frame = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x03];
    frame.extend_from_slice(&[0x01, 0x00, 0x00, 0x00, 0x01]);
    stream.write_all(&frame).await.unwrap();

    let response = transact(&mut stream, 2, 7, &[0x01, 0x00, 0x00, 0x00, 0x01]).await;
    assert_eq!(response, vec![0x01, 0x01, 0x00]);
    token.cancel();
}

#[tokio::test]
async fn test_bad_protocol_id_closes_connection() {
    let store = Arc::new(CoilStore::new(200));
    let (addr, token) = start(store, None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(&[0x00, 0x01, 0x00, 0x05, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01])
        .await
        .unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);
    token.cancel();
}

#[tokio::test]
async fn test_stalled_request_released_on_shutdown() {
    let store = Arc::new(CoilStore::new(200));
    let (addr, token) = start(store, None).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Header announces a 5-byte PDU that never arrives
    stream
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("connection should close after shutdown")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_client_write_reaches_region() {
    let provider = MemoryRegionProvider::with_region("CADE_IO_MAP", 256);
    let gateway = Arc::new(SharedRegionGateway::new(provider.clone(), Default::default()));
    let store = Arc::new(CoilStore::new(200));
    let engine = Arc::new(SyncEngine::new(
        gateway,
        Arc::clone(&store),
        CoilMap::default(),
        None,
        Duration::from_millis(10),
    ));

    let (addr, token) = start(Arc::clone(&store), None).await;
    let tasks = engine.spawn(token.clone());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Manual coils 32 and 33 on
    transact(&mut stream, 1, 1, &[0x0F, 0x00, 0x20, 0x00, 0x02, 0x01, 0x03]).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(provider.peek("CADE_IO_MAP").unwrap()[2..4], [0x03, 0x00]);
    // And the outputs mirror follows the region
    let response = transact(&mut stream, 2, 1, &[0x01, 0x00, 0x10, 0x00, 0x02]).await;
    assert_eq!(response, vec![0x01, 0x01, 0x03]);

    token.cancel();
    tasks.join().await;
}
