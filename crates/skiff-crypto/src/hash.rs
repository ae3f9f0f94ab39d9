//! SHA-256 hashing and the two derivations built on it.
//!
//! - Session key: `SHA-256(decimal text of the DH shared secret)`
//! - Record IV: `SHA-256(timestamp || nonce)[..16]`

use sha2::{Digest, Sha256};

use crate::{IV_SIZE, NONCE_SIZE, SessionKey, TIMESTAMP_SIZE};

/// SHA-256 output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute the SHA-256 hash of input data.
#[must_use]
pub fn sha256(data: &[u8]) -> HashOutput {
    Sha256::digest(data).into()
}

/// Derive the session key from the decimal rendering of a shared secret.
///
/// Both peers must render the secret identically (no sign, no leading zeros),
/// which is what `BigUint`'s `Display` produces.
#[must_use]
pub fn derive_session_key(shared_secret_decimal: &str) -> SessionKey {
    SessionKey::from_bytes(sha256(shared_secret_decimal.as_bytes()))
}

/// Derive a record IV from its timestamp and nonce fields.
#[must_use]
pub fn derive_iv(timestamp: &[u8; TIMESTAMP_SIZE], nonce: &[u8; NONCE_SIZE]) -> [u8; IV_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(timestamp);
    hasher.update(nonce);
    let digest = hasher.finalize();

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&digest[..IV_SIZE]);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty_vector() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_session_key_is_hash_of_decimal_text() {
        // SHA-256("2")
        let key = derive_session_key("2");
        assert_eq!(
            hex::encode(key.as_bytes()),
            "d4735e3a265e16eee03f59718b9b5d03019c07d8b6c51f90da3a666eec13ab35"
        );
    }

    #[test]
    fn test_iv_is_truncated_hash() {
        let timestamp = 1_700_000_000u64.to_be_bytes();
        let nonce = [9u8; 8];

        let mut concat = Vec::new();
        concat.extend_from_slice(&timestamp);
        concat.extend_from_slice(&nonce);

        assert_eq!(derive_iv(&timestamp, &nonce), sha256(&concat)[..16]);
    }

    #[test]
    fn test_iv_depends_on_nonce() {
        let timestamp = 42u64.to_be_bytes();
        assert_ne!(derive_iv(&timestamp, &[0; 8]), derive_iv(&timestamp, &[1; 8]));
    }
}
