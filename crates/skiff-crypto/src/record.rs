//! Self-contained encrypted records.
//!
//! Each record carries its own freshness material, so records can be decrypted
//! independently of one another:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────┬─────────────────────────┐
//! │ timestamp(8) │ nonce(8) │  IV(16)  │ AES-256-CBC ciphertext  │
//! └──────────────┴──────────┴──────────┴─────────────────────────┘
//! IV = SHA-256(timestamp || nonce)[..16]
//! ```
//!
//! The ciphertext is PKCS#7 padded and carries no authentication tag.
//! Corruption is detected only when it happens to break the padding, which is a
//! weak guarantee and a potential padding oracle.

use std::time::{SystemTime, UNIX_EPOCH};

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::hash::derive_iv;
use crate::random::random_8;
use crate::{
    BLOCK_SIZE, CryptoError, IV_SIZE, NONCE_SIZE, RECORD_HEADER_SIZE, SESSION_KEY_SIZE,
    SessionKey, TIMESTAMP_SIZE,
};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Smallest well-formed record: header plus one cipher block.
pub const MIN_RECORD_SIZE: usize = RECORD_HEADER_SIZE + BLOCK_SIZE;

/// One encrypted chunk as it appears on the wire (without its length prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    timestamp: [u8; TIMESTAMP_SIZE],
    nonce: [u8; NONCE_SIZE],
    iv: [u8; IV_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedRecord {
    /// Parse a record from its wire bytes.
    ///
    /// Only the layout is checked here; the IV is taken as transmitted.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedRecord`] if the record is shorter than
    /// [`MIN_RECORD_SIZE`] or its ciphertext is not whole cipher blocks.
    pub fn parse(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(CryptoError::MalformedRecord("shorter than header plus one block"));
        }

        let ciphertext = &data[RECORD_HEADER_SIZE..];
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::MalformedRecord(
                "ciphertext is not a multiple of the block size",
            ));
        }

        let mut timestamp = [0u8; TIMESTAMP_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        let mut iv = [0u8; IV_SIZE];
        timestamp.copy_from_slice(&data[..TIMESTAMP_SIZE]);
        nonce.copy_from_slice(&data[TIMESTAMP_SIZE..TIMESTAMP_SIZE + NONCE_SIZE]);
        iv.copy_from_slice(&data[TIMESTAMP_SIZE + NONCE_SIZE..RECORD_HEADER_SIZE]);

        Ok(Self {
            timestamp,
            nonce,
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Serialize to `timestamp || nonce || iv || ciphertext`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.timestamp);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.iv);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Length of [`EncryptedRecord::to_bytes`].
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.ciphertext.len()
    }

    /// Sender's clock at encryption time, in UNIX seconds.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        u64::from_be_bytes(self.timestamp)
    }

    /// Random per-record nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// CBC initialization vector.
    #[must_use]
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// Padded ciphertext.
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Mutable ciphertext access (corruption tests, fuzzing).
    pub fn ciphertext_mut(&mut self) -> &mut Vec<u8> {
        &mut self.ciphertext
    }
}

/// Encrypt one plaintext block into a fresh record.
///
/// Uses the current wall-clock second and a random nonce, so encrypting the
/// same plaintext twice under one key yields different records.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
pub fn encrypt_record(plaintext: &[u8], key: &SessionKey) -> Result<EncryptedRecord, CryptoError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let nonce = random_8()?;
    encrypt_record_with(plaintext, key, timestamp, nonce)
}

/// Encrypt with caller-chosen freshness material.
///
/// Reusing a `(timestamp, nonce)` pair under one key reuses the IV; only tests
/// and fuzzers should call this directly.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if the cipher rejects the key.
pub fn encrypt_record_with(
    plaintext: &[u8],
    key: &SessionKey,
    timestamp: u64,
    nonce: [u8; NONCE_SIZE],
) -> Result<EncryptedRecord, CryptoError> {
    let timestamp = timestamp.to_be_bytes();
    let iv = derive_iv(&timestamp, &nonce);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: SESSION_KEY_SIZE,
            actual: key.as_bytes().len(),
        }
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(EncryptedRecord {
        timestamp,
        nonce,
        iv,
        ciphertext,
    })
}

/// Decrypt a record and strip its padding.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPadding`] if the decrypted padding is not
/// valid PKCS#7, which is how a wrong key or corrupted record shows up.
pub fn decrypt_record(record: &EncryptedRecord, key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &record.iv).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: SESSION_KEY_SIZE,
            actual: key.as_bytes().len(),
        }
    })?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&record.ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}
