#![no_main]
use libfuzzer_sys::fuzz_target;
use lartrun_report::{classify, DiagnosticReport, Property};

fuzz_target!(|data: &[u8]| {
    // Parsing and classification must never panic on any stream.
    if let Ok(report) = DiagnosticReport::parse_reader(data) {
        let verdict = classify(&report, &[Property::Reach, Property::Memsafety]);
        assert!(verdict.result.is_valid_for(&[Property::Reach, Property::Memsafety]));
    }
});
