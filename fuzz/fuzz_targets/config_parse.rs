//! Fuzz test for configuration file parsing
//!
//! Tests that arbitrary TOML input doesn't cause panics when parsed and
//! validated as a Skiff configuration.

#![no_main]

use libfuzzer_sys::fuzz_target;
use skiff_cli::config::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<Config>(s) {
            let _ = config.validate();
        }
    }
});
