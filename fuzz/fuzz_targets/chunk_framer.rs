//! Fuzz target for the chunk framer receive path
//!
//! Feeds arbitrary bytes to `receive_stream` as if they followed a filename.
//! The reader must terminate with `Ok` or `Err` and never allocate past the
//! record limit.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_core::receive_stream;
use skiff_crypto::SessionKey;

fuzz_target!(|data: &[u8]| {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    let key = SessionKey::from_bytes([0x42; 32]);

    runtime.block_on(async {
        let mut stream = data;
        let mut sink = Vec::new();
        if let Ok(stats) = receive_stream(&mut stream, &mut sink, &key, 1072).await {
            assert_eq!(stats.plaintext_bytes, sink.len() as u64);
        }
    });
});
