//! Fuzz target: `AccumDecoder::feed`
//!
//! The first input byte picks the armed meter; the rest is the line
//! traffic.  The decoder must never panic and must only ever yield a
//! frame for the meter it was armed for.
//!
//! cargo fuzz run fuzz_accum_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use meterlink::meter::MeterKind;
use meterlink::protocol::accum::AccumDecoder;
use meterlink::protocol::{DecodedFrame, MeterProtocol};

const ARMABLE: [MeterKind; 4] = [
    MeterKind::Water,
    MeterKind::HotWater,
    MeterKind::Gas,
    MeterKind::Heat,
];

fuzz_target!(|data: &[u8]| {
    let Some((&pick, traffic)) = data.split_first() else {
        return;
    };
    let kind = ARMABLE[pick as usize % ARMABLE.len()];

    let mut decoder = AccumDecoder::new();
    if decoder.arm(kind).is_err() {
        return;
    }

    let mut completed = 0;
    for &b in traffic {
        if let Ok(Some(frame)) = decoder.feed(b) {
            completed += 1;
            assert_eq!(frame.kind, kind, "foreign response accepted");
            assert!(frame.reading().is_some());
            assert_eq!(decoder.outstanding(), None);
        }
    }
    // One arm, at most one reading.
    assert!(completed <= 1);
});
