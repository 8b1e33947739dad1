#![no_main]

use libfuzzer_sys::fuzz_target;
use pop3_maildrop::core::framer::{Inbound, LineFramer};

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size, the rest is the stream
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut framer = LineFramer::new(64);
    for piece in stream.chunks(chunk) {
        for inbound in framer.feed(piece) {
            if let Inbound::Line(line) = inbound {
                assert!(line.len() <= 64 * 4);
                assert!(!line.contains('\n'));
            }
        }
        assert!(framer.pending() <= 64 + 1 + chunk);
    }
});
