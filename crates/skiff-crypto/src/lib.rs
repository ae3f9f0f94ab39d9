//! # Skiff Crypto
//!
//! Cryptographic primitives for the Skiff file transfer protocol.
//!
//! This crate provides:
//! - Finite-field Diffie-Hellman over configurable groups
//! - Session key derivation from the DH shared secret
//! - Self-contained encrypted records (timestamp, nonce, IV, ciphertext)
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Notes |
//! |----------|-----------|-------|
//! | Key Exchange | Finite-field DH | group injected via [`dh::DhParameters`] |
//! | Session Key | SHA-256 | over the decimal text of the shared secret |
//! | Record Cipher | AES-256-CBC + PKCS#7 | no authentication tag |
//! | IV Derivation | SHA-256 | truncated to 16 bytes |
//!
//! ## Security Notes
//!
//! The exchange is unauthenticated and records carry no MAC. Tampering is only
//! detected incidentally, when decryption yields invalid padding.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dh;
pub mod error;
pub mod hash;
pub mod random;
pub mod record;

pub use error::CryptoError;
pub use record::{EncryptedRecord, decrypt_record, encrypt_record};

/// Session key size (AES-256 key)
pub const SESSION_KEY_SIZE: usize = 32;

/// Record timestamp field size
pub const TIMESTAMP_SIZE: usize = 8;

/// Record nonce field size
pub const NONCE_SIZE: usize = 8;

/// Record IV field size (one AES block)
pub const IV_SIZE: usize = 16;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Fixed record header: timestamp + nonce + IV
pub const RECORD_HEADER_SIZE: usize = TIMESTAMP_SIZE + NONCE_SIZE + IV_SIZE;

/// Symmetric key shared by both peers of one connection.
///
/// Derived once per connection from the DH shared secret and never persisted.
#[derive(Clone, PartialEq, Eq, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }

    /// Short, non-secret identifier of this key for diagnostics.
    ///
    /// Both peers of a healthy session print the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(&hash::sha256(&self.0)[..8])
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionKey").field(&self.fingerprint()).finish()
    }
}
