//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Decrypted plaintext carried structurally invalid padding.
    ///
    /// Records have no authentication tag, so this is the only signal that
    /// ciphertext, IV or key did not match.
    #[error("decryption failed: invalid padding")]
    InvalidPadding,

    /// Record bytes do not follow the fixed field layout
    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Peer's DH public value is not usable in the configured group
    #[error("invalid public value: {0}")]
    InvalidPublicValue(String),

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,
}
