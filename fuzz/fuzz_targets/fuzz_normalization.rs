#![no_main]
use libfuzzer_sys::fuzz_target;
use turnguard::model::AuditRequest;
use turnguard::normalize::normalize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Should never panic on any UTF-8 prompt, and views must come out closed.
        let request = AuditRequest::new("fuzz", 0, s);
        let normalized = normalize(&request);
        assert!(normalized.views.prompt.is_closed());
    }
});
