//! Finite-field Diffie-Hellman key exchange.
//!
//! Both peers hold the same [`DhParameters`] out of band. Each side draws a
//! private exponent in `[2, prime - 2]`, publishes `base^private mod prime` as
//! decimal text, and hashes the decimal text of the shared secret into a
//! [`SessionKey`].
//!
//! The exchange is unauthenticated: an active interposer can substitute its own
//! public value on both legs.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;

use crate::{CryptoError, SessionKey, hash};

/// RFC 3526 group 14 prime (2048-bit MODP), big-endian.
const MODP_2048_PRIME: [u8; 256] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2,
    0x21, 0x68, 0xC2, 0x34, 0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1,
    0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74, 0x02, 0x0B, 0xBE, 0xA6,
    0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D,
    0xF2, 0x5F, 0x14, 0x37, 0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45,
    0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6, 0xF4, 0x4C, 0x42, 0xE9,
    0xA6, 0x37, 0xED, 0x6B, 0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5, 0xAE, 0x9F, 0x24, 0x11,
    0x7C, 0x4B, 0x1F, 0xE6, 0x49, 0x28, 0x66, 0x51, 0xEC, 0xE4, 0x5B, 0x3D,
    0xC2, 0x00, 0x7C, 0xB8, 0xA1, 0x63, 0xBF, 0x05, 0x98, 0xDA, 0x48, 0x36,
    0x1C, 0x55, 0xD3, 0x9A, 0x69, 0x16, 0x3F, 0xA8, 0xFD, 0x24, 0xCF, 0x5F,
    0x83, 0x65, 0x5D, 0x23, 0xDC, 0xA3, 0xAD, 0x96, 0x1C, 0x62, 0xF3, 0x56,
    0x20, 0x85, 0x52, 0xBB, 0x9E, 0xD5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6D,
    0x67, 0x0C, 0x35, 0x4E, 0x4A, 0xBC, 0x98, 0x04, 0xF1, 0x74, 0x6C, 0x08,
    0xCA, 0x18, 0x21, 0x7C, 0x32, 0x90, 0x5E, 0x46, 0x2E, 0x36, 0xCE, 0x3B,
    0xE3, 0x9E, 0x77, 0x2C, 0x18, 0x0E, 0x86, 0x03, 0x9B, 0x27, 0x83, 0xA2,
    0xEC, 0x07, 0xA2, 0x8F, 0xB5, 0xC5, 0x5D, 0xF0, 0x6F, 0x4C, 0x52, 0xC9,
    0xDE, 0x2B, 0xCB, 0xF6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7C,
    0xEA, 0x95, 0x6A, 0xE5, 0x15, 0xD2, 0x26, 0x18, 0x98, 0xFA, 0x05, 0x10,
    0x15, 0x72, 0x8E, 0x5A, 0x8A, 0xAC, 0xAA, 0x68, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF,
];

/// Group parameters shared by both peers.
///
/// Invariant: `2 <= base < prime` and `prime > 3`, so the private-key range
/// `[2, prime - 2]` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParameters {
    prime: BigUint,
    base: BigUint,
}

impl DhParameters {
    /// Create parameters from a prime and a base.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParameter`] if `prime <= 3` or the base is
    /// outside `[2, prime)`.
    pub fn new(prime: BigUint, base: BigUint) -> Result<Self, CryptoError> {
        if prime <= BigUint::from(3u32) {
            return Err(CryptoError::InvalidParameter(format!(
                "prime must be greater than 3, got {prime}"
            )));
        }
        if base < BigUint::from(2u32) || base >= prime {
            return Err(CryptoError::InvalidParameter(format!(
                "base must satisfy 2 <= base < prime, got {base}"
            )));
        }
        Ok(Self { prime, base })
    }

    /// Parse parameters from a decimal prime and base.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParameter`] if either value is not a
    /// decimal integer or the values violate [`DhParameters::new`].
    pub fn from_decimal(prime: &str, base: &str) -> Result<Self, CryptoError> {
        let parse = |label: &str, text: &str| {
            parse_decimal(text).ok_or_else(|| {
                CryptoError::InvalidParameter(format!("{label} is not a decimal integer"))
            })
        };
        Self::new(parse("prime", prime)?, parse("base", base)?)
    }

    /// Tiny reference group (`prime = 23`, `base = 5`).
    ///
    /// Trivially breakable; only useful for interoperability tests and
    /// worked examples.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            prime: BigUint::from(23u32),
            base: BigUint::from(5u32),
        }
    }

    /// RFC 3526 group 14: 2048-bit safe prime with generator 2.
    #[must_use]
    pub fn modp_2048() -> Self {
        Self {
            prime: BigUint::from_bytes_be(&MODP_2048_PRIME),
            base: BigUint::from(2u32),
        }
    }

    /// The group prime.
    #[must_use]
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// The group base (generator).
    #[must_use]
    pub fn base(&self) -> &BigUint {
        &self.base
    }

    /// Size of the prime in bits.
    #[must_use]
    pub fn bits(&self) -> u64 {
        self.prime.bits()
    }

    /// Upper bound on the length of any public value's decimal text.
    #[must_use]
    pub fn max_public_value_len(&self) -> usize {
        self.prime.to_string().len()
    }
}

impl Default for DhParameters {
    fn default() -> Self {
        Self::modp_2048()
    }
}

/// A DH public value (`base^private mod prime`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(BigUint);

impl PublicKey {
    /// Parse a peer's public value from its decimal wire text.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicValue`] if the text is not plain
    /// ASCII decimal digits, or the value is `0` or not below the prime.
    pub fn parse_decimal(text: &str, params: &DhParameters) -> Result<Self, CryptoError> {
        let value = parse_decimal(text).ok_or_else(|| {
            CryptoError::InvalidPublicValue(format!("not a decimal integer: {:?}", truncate(text)))
        })?;

        if value.bits() == 0 || value >= params.prime {
            return Err(CryptoError::InvalidPublicValue(
                "value outside (0, prime)".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// Decimal text as sent on the wire.
    #[must_use]
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }

    /// The underlying integer.
    #[must_use]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

/// DH shared secret (`peer_public^private mod prime`).
pub struct SharedSecret(BigUint);

impl SharedSecret {
    /// Decimal rendering used as key-derivation input.
    #[must_use]
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }

    /// Hash the secret into the connection's session key.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        hash::derive_session_key(&self.to_decimal())
    }
}

/// Per-connection exchange state: a private exponent and its public value.
///
/// Created fresh for every connection and consumed when the session key is
/// derived.
pub struct KeyExchangeState {
    params: DhParameters,
    private_key: BigUint,
    public_key: PublicKey,
}

impl KeyExchangeState {
    /// Draw a private key uniformly from `[2, prime - 2]` using the OS CSPRNG.
    #[must_use]
    pub fn generate(params: &DhParameters) -> Self {
        let low = BigUint::from(2u32);
        // gen_biguint_range excludes the upper bound
        let high = &params.prime - 1u32;
        let private_key = OsRng.gen_biguint_range(&low, &high);
        Self::build(params.clone(), private_key)
    }

    /// Build state from a chosen private key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParameter`] if the key is outside
    /// `[2, prime - 2]`.
    pub fn from_private(params: &DhParameters, private_key: BigUint) -> Result<Self, CryptoError> {
        let max = &params.prime - 2u32;
        if private_key < BigUint::from(2u32) || private_key > max {
            return Err(CryptoError::InvalidParameter(
                "private key outside [2, prime - 2]".to_string(),
            ));
        }
        Ok(Self::build(params.clone(), private_key))
    }

    fn build(params: DhParameters, private_key: BigUint) -> Self {
        let public_key = PublicKey(params.base.modpow(&private_key, &params.prime));
        Self {
            params,
            private_key,
            public_key,
        }
    }

    /// Our public value.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Group parameters this state was created for.
    #[must_use]
    pub fn params(&self) -> &DhParameters {
        &self.params
    }

    /// Combine our private key with the peer's public value.
    #[must_use]
    pub fn shared_secret(&self, peer: &PublicKey) -> SharedSecret {
        SharedSecret(peer.0.modpow(&self.private_key, &self.params.prime))
    }

    /// Finish the exchange, consuming the private state.
    #[must_use]
    pub fn into_session_key(self, peer: &PublicKey) -> SessionKey {
        self.shared_secret(peer).session_key()
    }
}

impl std::fmt::Debug for KeyExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchangeState")
            .field("prime_bits", &self.params.bits())
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Strict decimal parse: ASCII digits only (no sign, whitespace or `_`).
fn parse_decimal(text: &str) -> Option<BigUint> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(text.as_bytes(), 10)
}

fn truncate(text: &str) -> String {
    text.chars().take(32).collect()
}
