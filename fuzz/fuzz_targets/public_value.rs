//! Fuzz target for DH public value parsing
//!
//! Accepted values must lie strictly between 0 and the prime and render back
//! to the same decimal text.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_crypto::dh::{DhParameters, PublicKey};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for params in [DhParameters::reference(), DhParameters::modp_2048()] {
        if let Ok(value) = PublicKey::parse_decimal(text, &params) {
            assert!(value.as_biguint() < params.prime());
            assert!(value.as_biguint().bits() > 0);
            assert_eq!(value.to_decimal(), text.trim_start_matches('0'));
        }
    }
});
