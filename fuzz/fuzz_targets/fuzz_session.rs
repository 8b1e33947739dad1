#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use pop3_maildrop::core::codec::encode_reply;
use pop3_maildrop::core::framer::LineFramer;
use pop3_maildrop::protocol::session::Session;

fuzz_target!(|data: &[u8]| {
    // Arbitrary command streams against a base directory with no maildrops
    let mut session = Session::new("/nonexistent-fuzz-base");
    let mut framer = LineFramer::new(512);
    let mut wire = BytesMut::new();

    for inbound in framer.feed(data) {
        let reply = session.handle_inbound(inbound);
        encode_reply(&reply, &mut wire);
        if session.is_finished() {
            break;
        }
    }
    session.close();
});
