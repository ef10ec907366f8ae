//! Fuzz target: `parse_form` (provisioning portal request body)
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - An accepted body always yields a complete configuration
//! - Accepted fields fit their 32-byte slots and the password is 8+ bytes
//!
//! cargo fuzz run fuzz_form_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinwatch::adapters::portal::parse_form;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = parse_form(data) else {
        return;
    };

    assert!(cfg.is_initialized(), "accepted form must be complete");
    assert!(cfg.password.len() >= 8, "accepted password shorter than 8 bytes");
    assert!(cfg.ssid.len() <= 32 && cfg.mqtt_server.len() <= 32);
    assert!(cfg.mqtt_port > 0);
});
