#![no_main]

use libfuzzer_sys::fuzz_target;
use numseq::numeral::{NumeralSystem, Step};

fuzz_target!(|data: (String, String, char, u8)| {
    let (alphabet, raw, pad, width) = data;

    // Arbitrary alphabets and widths are either rejected or usable.
    let Ok(system) = NumeralSystem::new(&alphabet, pad, width as usize) else {
        return;
    };

    // Malformed raw values must error, never panic.
    let Ok(step) = system.increment(&raw) else {
        return;
    };

    // A successful increment stays well-formed and moves forward by one.
    if let Step::Next(next) = step {
        assert_eq!(next.chars().count(), system.width());
        let before = system.decode(&raw).unwrap();
        let after = system.decode(&next).unwrap().unwrap();
        assert_eq!(before.map_or(0, |v| v + 1), after);
    }
});
