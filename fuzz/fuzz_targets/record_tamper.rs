//! Fuzz target for record tampering
//!
//! A single flipped ciphertext bit must never decrypt back to the original
//! plaintext.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skiff_crypto::record::encrypt_record_with;
use skiff_crypto::{SessionKey, decrypt_record};

#[derive(Debug, Arbitrary)]
struct Input {
    key: [u8; 32],
    plaintext: Vec<u8>,
    timestamp: u64,
    nonce: [u8; 8],
    position: u16,
    bit: u8,
}

fuzz_target!(|input: Input| {
    let key = SessionKey::from_bytes(input.key);
    let Ok(mut record) = encrypt_record_with(&input.plaintext, &key, input.timestamp, input.nonce)
    else {
        return;
    };

    assert_eq!(decrypt_record(&record, &key).ok().as_deref(), Some(&input.plaintext[..]));

    let len = record.ciphertext().len();
    record.ciphertext_mut()[input.position as usize % len] ^= 1 << (input.bit % 8);

    if let Ok(decrypted) = decrypt_record(&record, &key) {
        assert_ne!(decrypted, input.plaintext);
    }
});
