#![no_main]
use libfuzzer_sys::fuzz_target;

// Bridge replies come off a noisy serial line; decoding must never panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(sample) = linact_core::codec::decode_reply(data) {
        let _ = sample.position.is_finite();
    }
    for offset in [0usize, 18, 26, 34, data.len()] {
        let _ = linact_core::codec::decode_field(data, offset);
    }
});
