#![no_main]
use libfuzzer_sys::fuzz_target;
use turnguard::canonical::canonicalize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(s) {
            // Canonicalizing must never panic and must be idempotent: running
            // it again on the reparsed output reproduces the same string.
            let once = canonicalize(&value);
            let reparsed: serde_json::Value = serde_json::from_str(&once).expect("canonical output is valid JSON");
            let twice = canonicalize(&reparsed);
            assert_eq!(once, twice, "canonicalization is not idempotent");
        }
    }
});
