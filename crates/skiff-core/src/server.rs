//! Accepting side: one receive session per inbound connection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::session::{Role, TransferReport, TransferSession};

/// First delay after a failed accept
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Longest delay between accept attempts
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Protocol parameters shared by every session
    pub session: Arc<SessionConfig>,
    /// Directory received files are written into
    pub output_dir: PathBuf,
}

impl ServerConfig {
    /// Create a configuration
    pub fn new(session: SessionConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session: Arc::new(session),
            output_dir: output_dir.into(),
        }
    }
}

/// Bound listener that serves receive sessions
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an invalid session configuration
    /// or a missing output directory, and [`Error::Connection`] if binding
    /// fails.
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> Result<Self> {
        config.session.validate()?;
        if !config.output_dir.is_dir() {
            return Err(Error::InvalidConfig(
                format!("output directory {} does not exist", config.output_dir.display()).into(),
            ));
        }

        let listener = TcpListener::bind(addr).await.map_err(Error::Connection)?;
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::Connection)
    }

    /// Accept connections forever, one task per connection.
    ///
    /// A failing session is logged and does not affect the others or the
    /// accept loop. Accept errors back off exponentially until the next
    /// successful accept.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, output_dir = %self.config.output_dir.display(), "Listening"),
            Err(e) => warn!(error = %e, "Listening on unknown address"),
        }

        let mut failures = 0u32;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    failures = 0;
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        info!(%peer, "Connection accepted");
                        match handle_connection(stream, &config).await {
                            Ok(reports) => {
                                info!(%peer, files = reports.len(), "Connection closed");
                            }
                            Err(e) => {
                                warn!(%peer, error = %e, kind = ?e.kind(), "Session failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    error!(
                        error = %e,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Delay before the next accept after `failures` consecutive errors
fn accept_backoff(failures: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(failures.saturating_sub(1).min(10));
    (ACCEPT_BACKOFF_BASE * multiplier).min(ACCEPT_BACKOFF_MAX)
}

/// Run one receive session to completion.
///
/// # Errors
///
/// Returns the first handshake, framing, or file error of the session.
pub async fn handle_connection(stream: TcpStream, config: &ServerConfig) -> Result<Vec<TransferReport>> {
    let mut session = TransferSession::establish(stream, Role::Receiver, Arc::clone(&config.session)).await?;
    session.receive_all(&config.output_dir).await
}
