#![no_main]

use libfuzzer_sys::fuzz_target;
use pop3_maildrop::core::wire::Frame;

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic; anything accepted re-encodes to the same bytes
    if let Ok((frame, consumed)) = Frame::decode(data) {
        assert_eq!(&frame.to_bytes()[..], &data[..consumed]);
    }
});
