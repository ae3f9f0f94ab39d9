//! Bounded text tokens.
//!
//! The DH public value and each filename travel as UTF-8 text. Two framings
//! exist:
//!
//! - [`TextFraming::Delimited`]: the token ends with a single `\n`. The reader
//!   keeps reading until the delimiter and never consumes past it.
//! - [`TextFraming::Unframed`]: no delimiter is sent. The token is whatever
//!   one buffered read returns, cut short at a `\n` or NUL byte. Record length
//!   prefixes always start with a zero byte, so a filename that arrives glued
//!   to its first record still splits cleanly.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, ProtocolError, Result};

/// Token delimiter
pub const TEXT_DELIMITER: u8 = b'\n';

/// How text tokens are delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFraming {
    /// Each token ends with `\n`
    #[default]
    Delimited,
    /// Token boundaries follow the peer's writes
    Unframed,
}

/// Write one text token and flush it.
///
/// # Errors
///
/// Returns [`ProtocolError::DelimiterInText`] or [`ProtocolError::TextTooLong`]
/// for text the peer could not read back, and [`Error::Connection`] if the
/// write fails.
pub async fn write_text<W>(
    stream: &mut W,
    text: &str,
    framing: TextFraming,
    max_len: usize,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if text.bytes().any(|b| b == TEXT_DELIMITER || b == 0) {
        return Err(ProtocolError::DelimiterInText.into());
    }
    if text.len() > max_len {
        return Err(ProtocolError::TextTooLong { limit: max_len }.into());
    }

    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    if framing == TextFraming::Delimited {
        buf.push(TEXT_DELIMITER);
    }

    stream.write_all(&buf).await.map_err(Error::Connection)?;
    stream.flush().await.map_err(Error::Connection)
}

/// Read one text token.
///
/// Returns `Ok(None)` if the stream ends cleanly before the first byte.
///
/// # Errors
///
/// - [`ProtocolError::TextTooLong`] if the token runs past `max_len` bytes
/// - [`ProtocolError::InvalidUtf8`] if the token is not UTF-8
/// - [`Error::Connection`] if a delimited token is cut off by the end of the
///   stream, or the read fails
pub async fn read_text<R>(stream: &mut R, framing: TextFraming, max_len: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let buf = match framing {
        TextFraming::Delimited => read_delimited(stream, max_len).await?,
        TextFraming::Unframed => read_unframed(stream, max_len).await?,
    };

    match buf {
        Some(buf) => String::from_utf8(buf)
            .map(Some)
            .map_err(|_| ProtocolError::InvalidUtf8.into()),
        None => Ok(None),
    }
}

async fn read_delimited<R>(stream: &mut R, max_len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    let mut buf = Vec::new();

    let n = (&mut *stream)
        .take(limit)
        .read_until(TEXT_DELIMITER, &mut buf)
        .await
        .map_err(Error::Connection)?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&TEXT_DELIMITER) {
        if buf.len() as u64 >= limit {
            return Err(ProtocolError::TextTooLong { limit: max_len }.into());
        }
        return Err(Error::unexpected_eof("stream closed inside a text token"));
    }

    buf.pop();
    Ok(Some(buf))
}

async fn read_unframed<R>(stream: &mut R, max_len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let available = stream.fill_buf().await.map_err(Error::Connection)?;
    if available.is_empty() {
        return Ok(None);
    }

    let window = &available[..available.len().min(max_len.saturating_add(1))];
    let (len, consumed) = match window.iter().position(|&b| b == TEXT_DELIMITER || b == 0) {
        // A NUL belongs to the following length prefix
        Some(end) if window[end] == 0 => (end, end),
        Some(end) => (end, end + 1),
        None => (window.len(), window.len()),
    };

    if len > max_len {
        return Err(ProtocolError::TextTooLong { limit: max_len }.into());
    }

    let token = window[..len].to_vec();
    stream.consume(consumed);
    Ok(Some(token))
}
