//! Shared helpers for Skiff integration tests.
//!
//! [`RawPeer`] speaks the wire format byte by byte without going through
//! `TransferSession`, so tests can check the library against an independent
//! rendering of the protocol and inject malformed input.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use num_bigint::BigUint;
use skiff_crypto::SessionKey;
use skiff_crypto::dh::DhParameters;
use skiff_crypto::hash::derive_session_key;
use skiff_crypto::record::encrypt_record_with;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Deterministic test content
pub fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Poll until `path` holds exactly `expected`, or give up after `timeout`.
///
/// The accept loop writes files from its own tasks, so completion on the
/// sending side does not mean the receiver has flushed yet.
pub async fn wait_for_file(path: &Path, expected: &[u8], timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(data) = tokio::fs::read(path).await {
            if data == expected {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Hand-rolled sending peer
///
/// Writes after the key exchange are best effort: the receiver may already
/// have rejected the session and closed, and tests assert on the receiver's
/// outcome rather than the sender's.
pub struct RawPeer {
    stream: BufReader<TcpStream>,
    key: SessionKey,
}

impl RawPeer {
    /// Connect and run the key exchange with a fixed private key.
    pub async fn connect(addr: SocketAddr, params: &DhParameters, private_key: u64) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut stream = BufReader::new(stream);

        let private_key = BigUint::from(private_key);
        let public = params.base().modpow(&private_key, params.prime());
        stream
            .write_all(format!("{public}\n").as_bytes())
            .await
            .expect("send public value");

        let mut line = String::new();
        stream.read_line(&mut line).await.expect("read public value");
        let peer: BigUint = line.trim_end().parse().expect("decimal public value");

        let shared = peer.modpow(&private_key, params.prime());
        let key = derive_session_key(&shared.to_string());

        Self { stream, key }
    }

    /// Derived session key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Send a filename token
    pub async fn send_filename(&mut self, name: &str) {
        self.send_raw(format!("{name}\n").as_bytes()).await;
    }

    /// Send one length-prefixed record
    pub async fn send_record(&mut self, plaintext: &[u8], timestamp: u64, nonce: [u8; 8]) {
        let record = encrypt_record_with(plaintext, &self.key, timestamp, nonce)
            .expect("encrypt")
            .to_bytes();
        let mut frame = (record.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&record);
        self.send_raw(&frame).await;
    }

    /// Send the end-of-file terminator
    pub async fn send_terminator(&mut self) {
        self.send_raw(&[0, 0, 0, 0]).await;
    }

    /// Send arbitrary bytes
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let _ = self.stream.write_all(bytes).await;
        let _ = self.stream.flush().await;
    }

    /// Close the write half
    pub async fn finish(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
