//! # Skiff Core
//!
//! Core protocol implementation for Skiff, a point-to-point secure file
//! transfer protocol.
//!
//! This crate provides:
//! - Diffie-Hellman key exchange over a byte stream
//! - Chunk framing: length-prefixed encrypted records with a zero terminator
//! - The per-connection transfer session state machine
//! - A per-connection task accept loop and a connect helper
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      TransferSession                            │
//! │   (one connection: handshake, then filename + file, repeated)   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                        ChunkFramer                              │
//! │   ([u32 len][record] ... [u32 0]  per file)                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 KeyExchange  /  RecordCipher                    │
//! │   (skiff-crypto: DH, SHA-256, AES-256-CBC)                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The connecting peer always announces filenames and sends content; the
//! accepting peer always receives.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod framer;
pub mod handshake;
pub mod server;
pub mod session;
pub mod text;

pub use config::SessionConfig;
pub use error::{Error, ErrorKind, ProtocolError, Result};
pub use framer::{FrameStats, RecordReader, receive_stream, send_stream};
pub use handshake::perform_exchange;
pub use server::{Server, ServerConfig};
pub use session::{Role, SessionState, TransferReport, TransferSession};
pub use text::TextFraming;

/// Length prefix size in front of every record
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default plaintext bytes per record
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default bound on a text token (DH public value or filename)
pub const DEFAULT_MAX_TEXT_LEN: usize = 1024;
