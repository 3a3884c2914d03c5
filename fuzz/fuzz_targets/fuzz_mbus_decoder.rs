//! Fuzz target: `MbusDecoder::feed`
//!
//! Drives arbitrary byte sequences into the long-frame decoder and asserts
//! that it never panics, that every frame it yields is internally
//! consistent, and that a reset always returns it to hunting.
//!
//! cargo fuzz run fuzz_mbus_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use meterlink::protocol::mbus::{MAX_PAYLOAD, MbusDecoder};
use meterlink::protocol::{DecodedFrame, MeterProtocol};

fuzz_target!(|data: &[u8]| {
    let mut decoder = MbusDecoder::new();

    for &b in data {
        if let Ok(Some(frame)) = decoder.feed(b) {
            assert!(frame.payload.len() <= MAX_PAYLOAD);
            assert_eq!(frame.declared_length() as usize, frame.payload.len() + 3);
            assert!(frame.control & 0x80 == 0, "control high bit accepted");
            if let Some(reading) = frame.reading() {
                assert!(reading.value >= 0.0);
            }
        }
    }

    decoder.reset();
    assert!(decoder.is_idle());
    for &b in data {
        let _ = decoder.feed(b);
    }
});
