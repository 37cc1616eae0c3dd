#![no_main]

use libfuzzer_sys::fuzz_target;
use sentrypipe_core::event::parse_timestamp;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // must return Ok or Err without panicking
        let _ = parse_timestamp(text);
    }
});
