//! Transfer session state machine.
//!
//! One session spans one connection: a key exchange, then any number of
//! `filename + framed content` units, then the end of the stream.
//!
//! ```text
//! Handshaking ──► AwaitingFilename ──► TransferringFile
//!                      ▲    │                 │
//!                      │    │                 │
//!                      └────┼─────────────────┘
//!                           ▼
//!                         Closed   (also reached from any state on error)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use skiff_crypto::SessionKey;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::framer::{FrameStats, receive_stream, send_stream};
use crate::handshake::perform_exchange;
use crate::text::{read_text, write_text};

/// Longest filename accepted, in bytes
pub const MAX_FILENAME_LEN: usize = 255;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Key exchange in progress
    Handshaking,
    /// Between files
    AwaitingFilename,
    /// Framed content of one file in flight
    TransferringFile,
    /// Session over; no further operations
    Closed,
}

impl SessionState {
    /// Check if a transition is allowed
    #[must_use]
    pub fn can_transition(self, to: SessionState) -> bool {
        matches!(
            (self, to),
            (SessionState::Handshaking, SessionState::AwaitingFilename)
                | (SessionState::AwaitingFilename, SessionState::TransferringFile)
                | (SessionState::TransferringFile, SessionState::AwaitingFilename)
                | (_, SessionState::Closed)
        )
    }

    /// True until the session reaches [`SessionState::Closed`]
    #[must_use]
    pub fn is_open(self) -> bool {
        self != SessionState::Closed
    }
}

/// Which side of the transfer this peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connecting peer; announces filenames and sends content
    Sender,
    /// Accepting peer; writes received files
    Receiver,
}

/// Outcome of one transferred file
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Name announced on the wire
    pub file_name: String,
    /// Where the file was written (receiver only)
    pub path: Option<PathBuf>,
    /// Framing counters
    pub stats: FrameStats,
    /// Time spent on this file's content
    pub elapsed: Duration,
}

impl TransferReport {
    /// Plaintext throughput in bytes per second
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.plaintext_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// An established transfer session over one stream.
pub struct TransferSession<S> {
    stream: BufReader<S>,
    key: SessionKey,
    role: Role,
    state: SessionState,
    config: Arc<SessionConfig>,
    files_transferred: u64,
}

impl<S> TransferSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the key exchange and return a session ready for the first file.
    ///
    /// # Errors
    ///
    /// Returns the handshake error; the stream is dropped with it.
    pub async fn establish(stream: S, role: Role, config: Arc<SessionConfig>) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        debug!(?role, "Session handshaking");

        let key = perform_exchange(&mut stream, &config.dh, config.text_framing, config.max_text_len).await?;

        let mut session = Self {
            stream,
            key,
            role,
            state: SessionState::Handshaking,
            config,
            files_transferred: 0,
        };
        session.transition_to(SessionState::AwaitingFilename)?;

        Ok(session)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// This peer's role
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Key derived by the handshake
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Files completed so far
    #[must_use]
    pub fn files_transferred(&self) -> u64 {
        self.files_transferred
    }

    /// Transition to a new state
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<()> {
        if !self.state.can_transition(new_state) {
            return Err(Error::InvalidState(self.state));
        }

        let old_state = self.state;
        self.state = new_state;

        debug!("Session state transition: {:?} -> {:?}", old_state, new_state);

        Ok(())
    }

    /// Send a local file under its base name.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if this is not a sender between files
    /// - [`ProtocolError::InvalidFilename`] if the path has no usable base name
    /// - [`Error::FileIo`] if the file cannot be opened or read
    /// - [`Error::Connection`] if the stream breaks
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<TransferReport> {
        let path = path.as_ref();
        self.ensure_ready(Role::Sender)?;

        let result: Result<TransferReport> = async {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ProtocolError::InvalidFilename(path.display().to_string()))?;
            let mut file = File::open(path).await.map_err(Error::FileIo)?;
            self.send_unit(name, &mut file).await
        }
        .await;

        self.settle(result)
    }

    /// Send any async reader under `name`.
    ///
    /// # Errors
    ///
    /// Same as [`TransferSession::send_file`]; read failures on `source` are
    /// reported as [`Error::FileIo`].
    pub async fn send_named<R>(&mut self, name: &str, source: &mut R) -> Result<TransferReport>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_ready(Role::Sender)?;
        let result = self.send_unit(name, source).await;
        self.settle(result)
    }

    async fn send_unit<R>(&mut self, name: &str, source: &mut R) -> Result<TransferReport>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        validate_filename(name)?;
        write_text(&mut self.stream, name, self.config.text_framing, self.config.max_text_len).await?;
        self.transition_to(SessionState::TransferringFile)?;

        let start = Instant::now();
        let stats = send_stream(&mut self.stream, source, &self.key, self.config.chunk_size).await?;
        let elapsed = start.elapsed();

        self.transition_to(SessionState::AwaitingFilename)?;
        self.files_transferred += 1;

        info!(
            file = name,
            bytes = stats.plaintext_bytes,
            records = stats.records,
            "File sent"
        );

        Ok(TransferReport {
            file_name: name.to_string(),
            path: None,
            stats,
            elapsed,
        })
    }

    /// Receive the next file into `output_dir`.
    ///
    /// Returns `Ok(None)` once the peer signals there are no more files,
    /// either by ending the stream or by sending an empty filename. The
    /// session is then closed.
    ///
    /// An existing file with the same name is overwritten. A file cut short
    /// by an error is left as written.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if this is not a receiver between files
    /// - [`ProtocolError::InvalidFilename`] if the announced name is unsafe
    /// - [`Error::FileIo`] if the output file cannot be written
    /// - any framing or decryption error from the content
    pub async fn receive_next(&mut self, output_dir: impl AsRef<Path>) -> Result<Option<TransferReport>> {
        self.ensure_ready(Role::Receiver)?;
        let result = self.receive_unit(output_dir.as_ref()).await;
        self.settle(result)
    }

    async fn receive_unit(&mut self, output_dir: &Path) -> Result<Option<TransferReport>> {
        let name = read_text(&mut self.stream, self.config.text_framing, self.config.max_text_len).await?;
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            debug!(files = self.files_transferred, "Peer has no more files");
            self.transition_to(SessionState::Closed)?;
            return Ok(None);
        };

        validate_filename(&name)?;
        let path = output_dir.join(&name);
        let mut file = File::create(&path).await.map_err(Error::FileIo)?;
        self.transition_to(SessionState::TransferringFile)?;

        let start = Instant::now();
        let stats = receive_stream(
            &mut self.stream,
            &mut file,
            &self.key,
            self.config.record_limit(),
        )
        .await?;
        let elapsed = start.elapsed();

        self.transition_to(SessionState::AwaitingFilename)?;
        self.files_transferred += 1;

        info!(
            file = %name,
            path = %path.display(),
            bytes = stats.plaintext_bytes,
            records = stats.records,
            "File received"
        );

        Ok(Some(TransferReport {
            file_name: name,
            path: Some(path),
            stats,
            elapsed,
        }))
    }

    /// Receive files until the peer has no more.
    ///
    /// # Errors
    ///
    /// The first error from [`TransferSession::receive_next`].
    pub async fn receive_all(&mut self, output_dir: impl AsRef<Path>) -> Result<Vec<TransferReport>> {
        let output_dir = output_dir.as_ref();
        let mut reports = Vec::new();
        while let Some(report) = self.receive_next(output_dir).await? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Shut down our write half and close the session.
    ///
    /// For a sender this tells the receiver there are no more files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the shutdown fails.
    pub async fn finish(mut self) -> Result<()> {
        if self.state.is_open() {
            self.transition_to(SessionState::Closed)?;
        }
        self.stream.shutdown().await.map_err(Error::Connection)?;
        debug!(files = self.files_transferred, "Session finished");
        Ok(())
    }

    fn ensure_ready(&self, role: Role) -> Result<()> {
        if self.role != role || self.state != SessionState::AwaitingFilename {
            return Err(Error::InvalidState(self.state));
        }
        Ok(())
    }

    /// Close the session if `result` is an error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(error = %e, state = ?self.state, "Session aborted");
            self.state = SessionState::Closed;
        }
        result
    }
}

impl<S> std::fmt::Debug for TransferSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSession")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("key", &self.key)
            .field("files_transferred", &self.files_transferred)
            .finish_non_exhaustive()
    }
}

/// Check that `name` is a plain file name.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFilename`] if the name is empty, longer
/// than [`MAX_FILENAME_LEN`], `.` or `..`, or contains a path separator, NUL
/// or newline.
pub fn validate_filename(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.len() > MAX_FILENAME_LEN
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0', '\n']);

    if invalid {
        return Err(ProtocolError::InvalidFilename(name.to_string()).into());
    }
    Ok(())
}
