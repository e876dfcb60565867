#![no_main]
use libfuzzer_sys::fuzz_target;
use turnguard::model::AuditRequest;
use turnguard::normalize::normalize;
use turnguard::scan::detect::KeywordInjectionScanner;
use turnguard::scan::{ScanContext, ScanMode, Scanner};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let request = AuditRequest::new("fuzz", 0, s);
        let input = normalize(&request);
        let scanner = KeywordInjectionScanner::default();
        let ctx = ScanContext { mode: ScanMode::Audit };

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let first = rt.block_on(scanner.run(&input, &ctx)).map(|o| o.findings.len());
        let second = rt.block_on(scanner.run(&input, &ctx)).map(|o| o.findings.len());
        assert_eq!(first.ok(), second.ok(), "non-deterministic keyword detection");
    }
});
