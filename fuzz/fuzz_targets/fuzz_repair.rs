#![no_main]

use imr_parser::{Fault, classify_line, parse_tolerant};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let result = parse_tolerant(input);
    assert!(result.repairs.len() <= imr_parser::DEFAULT_MAX_REPAIR_ATTEMPTS);
    assert_eq!(result.document.is_some(), result.is_done());
    for repair in &result.repairs {
        assert_ne!(repair.before, repair.after);
    }

    // Line repairs must never panic on arbitrary text.
    for line in input.lines() {
        if let Some(fault) = classify_line(line) {
            let _ = Fault::repair_line(fault, line);
        }
    }
});
