#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(report) = std::str::from_utf8(data) else {
        return;
    };
    let _ = covup::detect::detect_format(report);
    let _ = covup::parsers::lcov::read_records(report);
});
