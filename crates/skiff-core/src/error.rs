//! Error types for the Skiff core protocol.
//!
//! Every failure inside a session aborts that session. Callers that need to
//! react differently per failure class use [`Error::kind`].

use std::borrow::Cow;
use std::io;

use skiff_crypto::CryptoError;
use thiserror::Error;

use crate::session::SessionState;

/// Core protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// Stream closed or broke unexpectedly
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    /// Peer sent bytes that violate the wire format
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Record decryption failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Local file read or write failed
    #[error("file I/O error: {0}")]
    FileIo(#[source] io::Error),

    /// Operation not permitted in the session's current state or role
    #[error("operation not permitted in state {0:?}")]
    InvalidState(SessionState),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),
}

/// Wire-format violations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Peer's DH public value is not a usable decimal integer
    #[error("malformed DH public value: {0}")]
    MalformedPublicValue(#[source] CryptoError),

    /// Text token exceeded the configured bound
    #[error("text token exceeds {limit} bytes")]
    TextTooLong {
        /// Configured bound
        limit: usize,
    },

    /// Text token is not UTF-8
    #[error("text token is not valid UTF-8")]
    InvalidUtf8,

    /// Outgoing text contains a newline or NUL byte
    #[error("text token contains a newline or NUL byte")]
    DelimiterInText,

    /// Stream ended part-way through a record length prefix
    #[error("length prefix truncated after {received} bytes")]
    TruncatedLengthPrefix {
        /// Bytes received before the stream ended
        received: usize,
    },

    /// Record length exceeds what the agreed chunk size can produce
    #[error("record length {len} exceeds maximum {max}")]
    RecordTooLarge {
        /// Announced length
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Record bytes do not follow the record layout
    #[error("malformed record: {0}")]
    MalformedRecord(#[source] CryptoError),

    /// Filename is empty, contains path components, or is otherwise unsafe
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
}

/// Coarse failure classes for reporting and policy decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Stream closed or broken
    Connection,
    /// Malformed peer input
    Protocol,
    /// Decryption produced invalid padding (integrity failure)
    Padding,
    /// Local file I/O failure
    FileIo,
    /// Operation attempted in the wrong state or role
    State,
    /// Invalid configuration
    Config,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Crypto(CryptoError::InvalidPadding) => ErrorKind::Padding,
            Error::Crypto(_) => ErrorKind::Protocol,
            Error::FileIo(_) => ErrorKind::FileIo,
            Error::InvalidState(_) => ErrorKind::State,
            Error::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// True if a record failed to decrypt because of invalid padding.
    ///
    /// This is the only tamper signal the record format offers, and it is not
    /// guaranteed to fire for every corruption.
    #[must_use]
    pub fn is_padding_failure(&self) -> bool {
        self.kind() == ErrorKind::Padding
    }

    /// Stream ended where more bytes were required.
    #[must_use]
    pub fn unexpected_eof(context: &'static str) -> Self {
        Error::Connection(io::Error::new(io::ErrorKind::UnexpectedEof, context))
    }

    /// Create an invalid configuration error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        Error::InvalidConfig(Cow::Borrowed(context))
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::unexpected_eof("test").kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            Error::from(ProtocolError::InvalidUtf8).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::from(CryptoError::InvalidPadding).kind(),
            ErrorKind::Padding
        );
        assert_eq!(
            Error::from(CryptoError::MalformedRecord("short")).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            Error::FileIo(io::Error::other("disk full")).kind(),
            ErrorKind::FileIo
        );
        assert_eq!(
            Error::InvalidState(SessionState::Closed).kind(),
            ErrorKind::State
        );
        assert_eq!(Error::invalid_config("x").kind(), ErrorKind::Config);
    }

    #[test]
    fn test_padding_failure_is_distinct_from_protocol() {
        let padding = Error::from(CryptoError::InvalidPadding);
        let malformed = Error::from(ProtocolError::MalformedRecord(
            CryptoError::MalformedRecord("short"),
        ));

        assert!(padding.is_padding_failure());
        assert!(!malformed.is_padding_failure());
    }

    #[test]
    fn test_error_display() {
        let err = Error::from(ProtocolError::RecordTooLarge { len: 9000, max: 1072 });
        assert!(err.to_string().contains("9000"));
        assert!(err.to_string().contains("1072"));

        let err = Error::from(ProtocolError::InvalidFilename("../etc".into()));
        assert!(err.to_string().contains("../etc"));
    }
}
