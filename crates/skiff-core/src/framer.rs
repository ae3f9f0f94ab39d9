//! Chunk framing for one file's content.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────────┬─────┬──────────┐
//! │ len (BE) │ record       │ len (BE) │ record       │ ... │ 00000000 │
//! └──────────┴──────────────┴──────────┴──────────────┴─────┴──────────┘
//! ```
//!
//! Every chunk except the last carries exactly `chunk_size` plaintext bytes.
//! Records are never zero-length, so a zero prefix always means end of file.

use skiff_crypto::record::EncryptedRecord;
use skiff_crypto::{SessionKey, decrypt_record, encrypt_record};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::LENGTH_PREFIX_SIZE;
use crate::error::{Error, ProtocolError, Result};

/// End-of-file marker
pub const TERMINATOR: [u8; LENGTH_PREFIX_SIZE] = [0; LENGTH_PREFIX_SIZE];

/// Bytes of ciphertext and plaintext shown in trace output
const TRACE_PREVIEW_LEN: usize = 64;

/// Counters for one framed stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Records sent or received, excluding the terminator
    pub records: u64,
    /// Plaintext bytes carried
    pub plaintext_bytes: u64,
    /// Bytes on the wire, including prefixes and the terminator
    pub wire_bytes: u64,
}

/// Encrypt `source` chunk by chunk onto `stream`, then write the terminator.
///
/// An empty source produces only the terminator.
///
/// # Errors
///
/// - [`Error::InvalidConfig`] if `chunk_size` is zero
/// - [`Error::FileIo`] if reading `source` fails
/// - [`Error::Connection`] if writing to `stream` fails
pub async fn send_stream<W, R>(
    stream: &mut W,
    source: &mut R,
    key: &SessionKey,
    chunk_size: usize,
) -> Result<FrameStats>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    if chunk_size == 0 {
        return Err(Error::invalid_config("chunk size must be non-zero"));
    }

    let mut stats = FrameStats::default();
    let mut chunk = vec![0u8; chunk_size];
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + chunk_size + 48);

    loop {
        let filled = fill_chunk(source, &mut chunk).await?;
        if filled == 0 {
            break;
        }

        let record = encrypt_record(&chunk[..filled], key)?.to_bytes();
        let len = u32::try_from(record.len())
            .map_err(|_| Error::invalid_config("record does not fit the length prefix"))?;

        frame.clear();
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&record);
        stream.write_all(&frame).await.map_err(Error::Connection)?;

        stats.records += 1;
        stats.plaintext_bytes += filled as u64;
        stats.wire_bytes += frame.len() as u64;
        trace!(len = record.len(), plaintext = filled, "Sent record");

        if filled < chunk_size {
            break;
        }
    }

    stream.write_all(&TERMINATOR).await.map_err(Error::Connection)?;
    stream.flush().await.map_err(Error::Connection)?;
    stats.wire_bytes += LENGTH_PREFIX_SIZE as u64;

    Ok(stats)
}

/// Read until `buf` is full or `source` is exhausted.
async fn fill_chunk<R>(source: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await.map_err(Error::FileIo)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Pull-based reader for one framed file.
///
/// Yields decrypted chunks in order until the terminator. Any error ends the
/// stream; later calls return `Ok(None)`.
pub struct RecordReader<'a, R: ?Sized> {
    stream: &'a mut R,
    key: &'a SessionKey,
    max_record_len: usize,
    finished: bool,
    stats: FrameStats,
}

impl<'a, R> RecordReader<'a, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    /// Create a reader positioned at the first length prefix.
    pub fn new(stream: &'a mut R, key: &'a SessionKey, max_record_len: usize) -> Self {
        Self {
            stream,
            key,
            max_record_len,
            finished: false,
            stats: FrameStats::default(),
        }
    }

    /// Decrypt the next chunk.
    ///
    /// Returns `Ok(None)` after the terminator, and also if the stream ends
    /// cleanly exactly at a record boundary.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::TruncatedLengthPrefix`] if the stream ends inside a prefix
    /// - [`ProtocolError::RecordTooLarge`] if a length exceeds the limit
    /// - [`Error::Connection`] if the stream ends inside a record
    /// - [`ProtocolError::MalformedRecord`] if the record layout is invalid
    /// - [`Error::Crypto`] if decryption fails (usually invalid padding)
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_chunk().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(len) = self.read_length_prefix().await? else {
            trace!("Stream ended at a record boundary");
            return Ok(None);
        };
        self.stats.wire_bytes += LENGTH_PREFIX_SIZE as u64;

        if len == 0 {
            return Ok(None);
        }
        if len > self.max_record_len {
            return Err(ProtocolError::RecordTooLarge {
                len,
                max: self.max_record_len,
            }
            .into());
        }

        let mut record = vec![0u8; len];
        self.stream
            .read_exact(&mut record)
            .await
            .map_err(Error::Connection)?;
        self.stats.wire_bytes += len as u64;

        let record = EncryptedRecord::parse(&record).map_err(ProtocolError::MalformedRecord)?;
        let chunk = decrypt_record(&record, self.key)?;

        self.stats.records += 1;
        self.stats.plaintext_bytes += chunk.len() as u64;
        trace!(
            len,
            ciphertext = %hex_preview(record.ciphertext()),
            plaintext = %hex_preview(&chunk),
            "Received record"
        );

        Ok(Some(chunk))
    }

    async fn read_length_prefix(&mut self) -> Result<Option<usize>> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let mut received = 0;

        while received < LENGTH_PREFIX_SIZE {
            let n = self
                .stream
                .read(&mut prefix[received..])
                .await
                .map_err(Error::Connection)?;
            if n == 0 {
                if received == 0 {
                    return Ok(None);
                }
                return Err(ProtocolError::TruncatedLengthPrefix { received }.into());
            }
            received += n;
        }

        Ok(Some(u32::from_be_bytes(prefix) as usize))
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// True once the terminator, end of stream, or an error was seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Decrypt one framed file from `stream` into `sink`.
///
/// # Errors
///
/// Any error from [`RecordReader::next_chunk`], or [`Error::FileIo`] if
/// writing to `sink` fails.
pub async fn receive_stream<R, W>(
    stream: &mut R,
    sink: &mut W,
    key: &SessionKey,
    max_record_len: usize,
) -> Result<FrameStats>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut reader = RecordReader::new(stream, key, max_record_len);

    while let Some(chunk) = reader.next_chunk().await? {
        sink.write_all(&chunk).await.map_err(Error::FileIo)?;
    }
    sink.flush().await.map_err(Error::FileIo)?;

    Ok(reader.stats())
}

/// Hex of the first [`TRACE_PREVIEW_LEN`] bytes, marked when cut short
fn hex_preview(bytes: &[u8]) -> String {
    if bytes.len() <= TRACE_PREVIEW_LEN {
        hex::encode(bytes)
    } else {
        format!("{}..", hex::encode(&bytes[..TRACE_PREVIEW_LEN]))
    }
}
