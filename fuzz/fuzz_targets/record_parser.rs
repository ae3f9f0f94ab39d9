//! Fuzz target for record parsing
//!
//! Tests that arbitrary bytes are either rejected by the record parser or
//! decrypt to `Ok`/`Err` without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_crypto::{EncryptedRecord, SessionKey, decrypt_record};

fuzz_target!(|data: &[u8]| {
    let key = SessionKey::from_bytes([0x42; 32]);

    if let Ok(record) = EncryptedRecord::parse(data) {
        assert_eq!(record.to_bytes(), data);
        let _ = decrypt_record(&record, &key);
    }
});
