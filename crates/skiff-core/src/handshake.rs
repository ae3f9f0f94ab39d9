//! Diffie-Hellman handshake over a byte stream.
//!
//! Both peers send their public value as decimal text, framed per
//! [`TextFraming`], and then read the other's. The exchange is symmetric, so neither side waits on the other
//! before writing. Nothing is authenticated: an active attacker can sit in the
//! middle of this handshake undetected.

use skiff_crypto::SessionKey;
use skiff_crypto::dh::{DhParameters, KeyExchangeState, PublicKey};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{Error, ProtocolError, Result};
use crate::text::{TextFraming, read_text, write_text};

/// Run a fresh key exchange and derive the session key.
///
/// A new private key is drawn for every call.
///
/// # Errors
///
/// - [`Error::Connection`] if the peer closes before sending its public value
/// - [`ProtocolError::MalformedPublicValue`] if the peer's value is not a
///   decimal integer in `(0, prime)`
/// - [`ProtocolError::TextTooLong`] if the peer's text exceeds `max_text_len`
pub async fn perform_exchange<S>(
    stream: &mut S,
    params: &DhParameters,
    framing: TextFraming,
    max_text_len: usize,
) -> Result<SessionKey>
where
    S: AsyncBufRead + AsyncWrite + Unpin + ?Sized,
{
    let state = KeyExchangeState::generate(params);
    exchange_with(stream, state, framing, max_text_len).await
}

/// Run the exchange with prepared state.
///
/// # Errors
///
/// Same as [`perform_exchange`].
pub async fn exchange_with<S>(
    stream: &mut S,
    state: KeyExchangeState,
    framing: TextFraming,
    max_text_len: usize,
) -> Result<SessionKey>
where
    S: AsyncBufRead + AsyncWrite + Unpin + ?Sized,
{
    let ours = state.public_key().to_decimal();
    debug!(bits = state.params().bits(), "Sending DH public value");
    write_text(stream, &ours, framing, max_text_len).await?;

    let text = read_text(stream, framing, max_text_len)
        .await?
        .ok_or_else(|| Error::unexpected_eof("peer closed before sending its public value"))?;

    let peer = PublicKey::parse_decimal(&text, state.params())
        .map_err(ProtocolError::MalformedPublicValue)?;

    let key = state.into_session_key(&peer);
    info!(fingerprint = %key.fingerprint(), "Session key established");

    Ok(key)
}
