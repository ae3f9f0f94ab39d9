//! Integration tests over real TCP connections.
//!
//! Exercises skiff-core's accept loop and connect helper end to end, and checks
//! the library against hand-built wire images from `RawPeer`.

use std::sync::Arc;
use std::time::Duration;

use skiff_core::server::handle_connection;
use skiff_core::{
    ErrorKind, ProtocolError, Server, ServerConfig, SessionConfig, SessionState, TextFraming,
    client,
};
use skiff_crypto::dh::DhParameters;
use skiff_crypto::hash::derive_session_key;
use skiff_crypto::record::encrypt_record_with;
use skiff_integration_tests::{RawPeer, content, wait_for_file};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const WAIT: Duration = Duration::from_secs(10);

/// Accept exactly one connection and run a receive session on it
async fn receive_one(
    session: SessionConfig,
    output: &TempDir,
) -> (
    std::net::SocketAddr,
    tokio::task::JoinHandle<skiff_core::Result<Vec<skiff_core::TransferReport>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig::new(session, output.path());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        handle_connection(stream, &config).await
    });

    (addr, handle)
}

// ============================================================================
// End-to-End Transfers
// ============================================================================

#[tokio::test]
async fn test_two_files_over_tcp() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let a = src.path().join("a.txt");
    let b = src.path().join("b.txt");
    std::fs::write(&a, b"alpha").unwrap();
    std::fs::write(&b, content(5000, 3)).unwrap();

    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let sent = client::send_files(addr, &[&a, &b], Arc::new(SessionConfig::reference()))
        .await
        .unwrap();
    let received = receiver.await.unwrap().unwrap();

    assert_eq!(sent.len(), 2);
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].file_name, "a.txt");
    assert_eq!(received[1].file_name, "b.txt");
    assert_eq!(received[1].stats.records, 5);
    assert_eq!(received[1].stats, sent[1].stats);

    assert_eq!(std::fs::read(out.path().join("a.txt")).unwrap(), b"alpha");
    assert_eq!(
        std::fs::read(out.path().join("b.txt")).unwrap(),
        content(5000, 3)
    );
}

#[tokio::test]
async fn test_default_group_over_tcp() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let file = src.path().join("payload.bin");
    std::fs::write(&file, content(2500, 9)).unwrap();

    let (addr, receiver) = receive_one(SessionConfig::default(), &out).await;

    let sent = client::send_files(addr, &[&file], Arc::new(SessionConfig::default()))
        .await
        .unwrap();
    let received = receiver.await.unwrap().unwrap();

    // 1024 + 1024 + 452
    assert_eq!(sent[0].stats.records, 3);
    assert_eq!(received[0].stats.plaintext_bytes, 2500);
    assert_eq!(
        std::fs::read(out.path().join("payload.bin")).unwrap(),
        content(2500, 9)
    );
}

#[tokio::test]
async fn test_empty_file_over_tcp() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let file = src.path().join("empty");
    std::fs::write(&file, b"").unwrap();

    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let sent = client::send_files(addr, &[&file], Arc::new(SessionConfig::reference()))
        .await
        .unwrap();
    let received = receiver.await.unwrap().unwrap();

    assert_eq!(sent[0].stats.wire_bytes, 4);
    assert_eq!(received[0].stats.records, 0);
    assert!(std::fs::read(out.path().join("empty")).unwrap().is_empty());
}

#[tokio::test]
async fn test_session_without_files() {
    let out = TempDir::new().unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let session = client::connect(addr, Arc::new(SessionConfig::reference()))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::AwaitingFilename);
    session.finish().await.unwrap();

    assert!(receiver.await.unwrap().unwrap().is_empty());
}

// ============================================================================
// Wire Compatibility
// ============================================================================

#[tokio::test]
async fn test_hand_built_wire_image_is_accepted() {
    let out = TempDir::new().unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let mut peer = RawPeer::connect(addr, &DhParameters::reference(), 15).await;
    peer.send_filename("manual.txt").await;
    peer.send_record(b"hello ", 1_700_000_000, [1; 8]).await;
    peer.send_record(b"world", 1_700_000_001, [2; 8]).await;
    peer.send_terminator().await;
    peer.finish().await;

    let received = receiver.await.unwrap().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].stats.records, 2);
    assert_eq!(
        std::fs::read(out.path().join("manual.txt")).unwrap(),
        b"hello world"
    );
}

#[tokio::test]
async fn test_missing_terminator_at_clean_end() {
    let out = TempDir::new().unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let mut peer = RawPeer::connect(addr, &DhParameters::reference(), 7).await;
    peer.send_filename("tail.bin").await;
    peer.send_record(b"last chunk", 0, [0; 8]).await;
    peer.finish().await;

    let received = receiver.await.unwrap().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(
        std::fs::read(out.path().join("tail.bin")).unwrap(),
        b"last chunk"
    );
}

#[tokio::test]
async fn test_bare_text_tokens_over_tcp() {
    let out = TempDir::new().unwrap();
    let session = SessionConfig::reference().with_text_framing(TextFraming::Unframed);
    let (addr, receiver) = receive_one(session, &out).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // 8 = 5^6 mod 23, with no delimiter
    stream.write_all(b"8").await.unwrap();
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let peer: u64 = std::str::from_utf8(&buf[..n]).unwrap().parse().unwrap();
    let shared = (0..6).fold(1, |acc, _| acc * peer % 23);
    let key = derive_session_key(&shared.to_string());

    let record = encrypt_record_with(b"bare tokens", &key, 0, [3; 8])
        .unwrap()
        .to_bytes();
    let mut wire = b"a.txt".to_vec();
    wire.extend_from_slice(&(record.len() as u32).to_be_bytes());
    wire.extend_from_slice(&record);
    wire.extend_from_slice(&[0, 0, 0, 0]);
    stream.write_all(&wire).await.unwrap();
    stream.shutdown().await.unwrap();

    let received = receiver.await.unwrap().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].file_name, "a.txt");
    assert_eq!(
        std::fs::read(out.path().join("a.txt")).unwrap(),
        b"bare tokens"
    );
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let parent = TempDir::new().unwrap();
    let out = TempDir::new_in(parent.path()).unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let mut peer = RawPeer::connect(addr, &DhParameters::reference(), 9).await;
    peer.send_filename("../escaped.txt").await;
    peer.send_record(b"nope", 0, [0; 8]).await;
    peer.send_terminator().await;
    peer.finish().await;

    let err = receiver.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        skiff_core::Error::Protocol(ProtocolError::InvalidFilename(_))
    ));
    assert!(!parent.path().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_tampered_record_fails_session() {
    let out = TempDir::new().unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let mut peer = RawPeer::connect(addr, &DhParameters::reference(), 11).await;
    peer.send_filename("bad.bin").await;

    // 27-byte plaintext: two blocks, flip the last byte of the first one
    let mut record = skiff_crypto::record::encrypt_record_with(&[0x33; 27], peer.key(), 5, [5; 8])
        .unwrap();
    record.ciphertext_mut()[15] ^= 0x01;
    let bytes = record.to_bytes();
    let mut frame = (bytes.len() as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(&bytes);
    peer.send_raw(&frame).await;
    peer.send_terminator().await;
    peer.finish().await;

    let err = receiver.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Padding);
}

#[tokio::test]
async fn test_oversized_length_prefix_fails_session() {
    let out = TempDir::new().unwrap();
    let (addr, receiver) = receive_one(SessionConfig::reference(), &out).await;

    let mut peer = RawPeer::connect(addr, &DhParameters::reference(), 4).await;
    peer.send_filename("huge.bin").await;
    peer.send_raw(&u32::MAX.to_be_bytes()).await;
    peer.finish().await;

    let err = receiver.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        skiff_core::Error::Protocol(ProtocolError::RecordTooLarge { .. })
    ));
}

// ============================================================================
// Accept Loop
// ============================================================================

#[tokio::test]
async fn test_failed_session_does_not_stop_server() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let config = ServerConfig::new(SessionConfig::reference(), out.path());
    let server = Server::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let server = tokio::spawn(server.run());

    // Garbage instead of a public value
    let mut bad = GarbagePeer::connect(addr).await;
    bad.write(b"not-a-number\n").await;

    // Truncated record from a peer that completed the handshake
    let mut cut = RawPeer::connect(addr, &DhParameters::reference(), 3).await;
    cut.send_filename("cut.bin").await;
    cut.send_raw(&[0, 0, 0, 64, 1, 2, 3]).await;
    cut.finish().await;

    // A well-behaved sender still gets through
    let file = src.path().join("good.txt");
    std::fs::write(&file, content(3000, 1)).unwrap();
    client::send_files(addr, &[&file], Arc::new(SessionConfig::reference()))
        .await
        .unwrap();

    assert!(wait_for_file(&out.path().join("good.txt"), &content(3000, 1), WAIT).await);
    server.abort();
}

#[tokio::test]
async fn test_concurrent_senders() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let config = ServerConfig::new(SessionConfig::reference(), out.path());
    let server = Server::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let server = tokio::spawn(server.run());

    let mut senders = Vec::new();
    for i in 0..4u8 {
        let path = src.path().join(format!("file-{i}.bin"));
        std::fs::write(&path, content(1500 + i as usize * 700, i)).unwrap();
        senders.push(tokio::spawn(async move {
            client::send_files(addr, &[path], Arc::new(SessionConfig::reference())).await
        }));
    }
    for sender in senders {
        sender.await.unwrap().unwrap();
    }

    for i in 0..4u8 {
        let expected = content(1500 + i as usize * 700, i);
        let path = out.path().join(format!("file-{i}.bin"));
        assert!(wait_for_file(&path, &expected, WAIT).await, "file-{i}.bin");
    }
    server.abort();
}

/// Minimal client that writes bytes without any protocol logic
struct GarbagePeer {
    stream: TcpStream,
}

impl GarbagePeer {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
        }
    }

    async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }
}
