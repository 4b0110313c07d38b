#![no_main]
use libfuzzer_sys::fuzz_target;
use tuner_core::protocol::{classify_get, classify_set};
use tuner_core::{CalibrationEntry, CommandId, parse_flag, parse_number};

fuzz_target!(|data: &str| {
    let _ = classify_set(CommandId::TempSet, data);
    if let Ok(raw) = classify_get(CommandId::TcVoltageMeasure, data) {
        let _ = parse_number(&raw);
        let _ = parse_flag(&raw);
    }
    if let Ok(entry) = data.parse::<CalibrationEntry>() {
        // a decoded entry must re-encode to something that decodes the same
        let again: CalibrationEntry = entry.to_string().parse().unwrap();
        assert_eq!(entry, again);
    }
});
