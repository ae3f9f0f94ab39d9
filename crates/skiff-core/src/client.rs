//! Connecting side: open a session and send files.

use std::path::Path;
use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::info;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::session::{Role, TransferReport, TransferSession};

/// Connect and run the key exchange as the sender.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for an invalid configuration,
/// [`Error::Connection`] if the connection fails, or the handshake error.
pub async fn connect(
    addr: impl ToSocketAddrs,
    config: Arc<SessionConfig>,
) -> Result<TransferSession<TcpStream>> {
    config.validate()?;

    let stream = TcpStream::connect(addr).await.map_err(Error::Connection)?;
    if let Ok(peer) = stream.peer_addr() {
        info!(%peer, "Connected");
    }
    stream.set_nodelay(true).map_err(Error::Connection)?;

    TransferSession::establish(stream, Role::Sender, config).await
}

/// Send `paths` in order over one session, then close it.
///
/// # Errors
///
/// Stops at the first failure; files already sent stay sent.
pub async fn send_files<P>(
    addr: impl ToSocketAddrs,
    paths: &[P],
    config: Arc<SessionConfig>,
) -> Result<Vec<TransferReport>>
where
    P: AsRef<Path>,
{
    let mut session = connect(addr, config).await?;

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        reports.push(session.send_file(path).await?);
    }

    session.finish().await?;
    Ok(reports)
}
