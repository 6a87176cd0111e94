//! Fuzz target: PM2.5 `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences through the 4-byte frame decoder and
//! checks that every reading it emits came from a checksum-valid frame
//! ending at that byte, and that a clean frame always decodes afterwards.
//!
//! cargo fuzz run fuzz_pm25_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use streetlight::sensors::pm25::{FRAME_HEADER, FrameDecoder, checksum, encode_frame};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    for (i, &byte) in data.iter().enumerate() {
        if let Some(reading) = decoder.feed(byte) {
            assert!(i >= 3, "reading before a full frame");
            let frame = &data[i - 3..=i];
            assert_eq!(frame[0], FRAME_HEADER);
            assert_eq!(checksum(frame[0], frame[1], frame[2]), frame[3]);
            assert_eq!(reading.value, u16::from(frame[1]) * 128 + u16::from(frame[2]));
        }
    }

    // Whatever came before, a fresh header resynchronises the decoder.
    let frame = encode_frame(172);
    let got: Vec<_> = frame.iter().filter_map(|&b| decoder.feed(b)).collect();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].value, 172);
});
