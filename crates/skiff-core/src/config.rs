//! Session configuration.
//!
//! Every value here is a fixed protocol parameter: both peers must be
//! configured identically, nothing is negotiated on the wire.

use skiff_crypto::dh::DhParameters;
use skiff_crypto::{BLOCK_SIZE, RECORD_HEADER_SIZE};

use crate::error::{Error, Result};
use crate::text::TextFraming;
use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_TEXT_LEN};

/// Largest accepted chunk size (16 MiB)
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Largest accepted text token bound (64 KiB)
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// Protocol parameters for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Diffie-Hellman group
    pub dh: DhParameters,
    /// Plaintext bytes per record
    pub chunk_size: usize,
    /// Bound on text tokens (public value, filename), excluding the delimiter
    pub max_text_len: usize,
    /// Text token framing
    pub text_framing: TextFraming,
    /// Largest record accepted from the peer; derived from `chunk_size` if unset
    pub max_record_len: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dh: DhParameters::modp_2048(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            text_framing: TextFraming::Delimited,
            max_record_len: None,
        }
    }
}

impl SessionConfig {
    /// Configuration using the tiny reference group (`23`, `5`).
    ///
    /// Insecure; for interoperability with reference peers and tests.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            dh: DhParameters::reference(),
            ..Self::default()
        }
    }

    /// Set the chunk size
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the DH group
    #[must_use]
    pub fn with_dh(mut self, dh: DhParameters) -> Self {
        self.dh = dh;
        self
    }

    /// Set the text token framing
    #[must_use]
    pub fn with_text_framing(mut self, text_framing: TextFraming) -> Self {
        self.text_framing = text_framing;
        self
    }

    /// Largest record the receive path will allocate for.
    #[must_use]
    pub fn record_limit(&self) -> usize {
        self.max_record_len
            .unwrap_or_else(|| max_record_len_for(self.chunk_size))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chunk size or text bound is out
    /// of range, the text bound cannot carry a public value of the configured
    /// group, or the record limit is below one full chunk.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::invalid_config("chunk size must be between 1 byte and 16 MiB"));
        }

        if self.max_text_len > MAX_TEXT_LEN {
            return Err(Error::invalid_config("max_text_len must not exceed 64 KiB"));
        }

        if self.max_text_len < self.dh.max_public_value_len() {
            return Err(Error::InvalidConfig(
                format!(
                    "max_text_len {} is too small for {}-bit public values ({} digits)",
                    self.max_text_len,
                    self.dh.bits(),
                    self.dh.max_public_value_len()
                )
                .into(),
            ));
        }

        if let Some(limit) = self.max_record_len {
            if limit < max_record_len_for(self.chunk_size) {
                return Err(Error::invalid_config(
                    "max_record_len is smaller than a record for one full chunk",
                ));
            }
            if limit > u32::MAX as usize {
                return Err(Error::invalid_config(
                    "max_record_len does not fit the 4-byte length prefix",
                ));
            }
        }

        Ok(())
    }
}

/// Size of the record produced by encrypting a full chunk.
///
/// PKCS#7 always adds between 1 and 16 bytes.
#[must_use]
pub fn max_record_len_for(chunk_size: usize) -> usize {
    RECORD_HEADER_SIZE + (chunk_size / BLOCK_SIZE + 1) * BLOCK_SIZE
}
