#![no_main]
use libfuzzer_sys::fuzz_target;
use lartrun_report::{ModelValue, NondetKind};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Split into a call-site name and a payload; decoding may fail but
        // must never panic.
        let (call, raw) = s.split_once('\n').unwrap_or((s, s));
        let _ = ModelValue::decode(NondetKind::from_call(call), raw);
    }
});
