#![no_main]
use covup::parsers::ReportParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(report) = std::str::from_utf8(data) else {
        return;
    };
    // Parser must not panic on any input.
    let parser = covup::parsers::clover::CloverParser::with_base_dir("/nonexistent/covup-fuzz");
    let _ = parser.parse(report);
});
