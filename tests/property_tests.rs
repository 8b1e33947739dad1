//! Property-based tests using proptest
//!
//! Framing, dot-stuffing and record decoding must hold for arbitrary input,
//! however the bytes are split across reads.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use pop3_maildrop::core::codec::{dot_stuff, dot_unstuff, encode_reply};
use pop3_maildrop::core::framer::{Inbound, LineFramer};
use pop3_maildrop::core::wire::{Address, FileRecord, Frame, ShortString};
use pop3_maildrop::protocol::reply::Body;
use pop3_maildrop::protocol::session::Session;
use pop3_maildrop::protocol::state::State;
use proptest::prelude::*;
use std::net::Ipv4Addr;

/// Feed `stream` in pieces cut at `cuts` and collect every completed line
fn frame_in_chunks(stream: &[u8], cuts: &[usize], max: usize) -> Vec<Inbound> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (stream.len() + 1)).collect();
    points.push(0);
    points.push(stream.len());
    points.sort_unstable();
    points.dedup();

    let mut framer = LineFramer::new(max);
    let mut out = Vec::new();
    for window in points.windows(2) {
        out.extend(framer.feed(&stream[window[0]..window[1]]));
    }
    out
}

fn line_strategy(max_len: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[ -~]{{0,{max_len}}}")).expect("regex")
}

// Property: the lines produced never depend on how the stream was split
proptest! {
    #[test]
    fn prop_framing_independent_of_chunking(
        lines in prop::collection::vec((line_strategy(60), any::<bool>()), 0..20),
        cuts in prop::collection::vec(any::<usize>(), 0..30),
    ) {
        let mut stream = Vec::new();
        for (line, crlf) in &lines {
            stream.extend_from_slice(line.as_bytes());
            stream.extend_from_slice(if *crlf { b"\r\n" } else { b"\n" });
        }

        let framed = frame_in_chunks(&stream, &cuts, 4096);
        let expected: Vec<Inbound> = lines.iter().map(|(l, _)| Inbound::Line(l.clone())).collect();
        prop_assert_eq!(framed, expected);
    }
}

// Property: overlong lines are reported once each and never corrupt their neighbours
proptest! {
    #[test]
    fn prop_overlong_lines_isolated(
        lines in prop::collection::vec(line_strategy(80), 1..15),
        cuts in prop::collection::vec(any::<usize>(), 0..30),
    ) {
        const MAX: usize = 32;
        let mut stream = Vec::new();
        for line in &lines {
            stream.extend_from_slice(line.as_bytes());
            stream.extend_from_slice(b"\r\n");
        }

        let framed = frame_in_chunks(&stream, &cuts, MAX);
        let expected: Vec<Inbound> = lines
            .iter()
            .map(|l| if l.len() > MAX { Inbound::Overlong } else { Inbound::Line(l.clone()) })
            .collect();
        prop_assert_eq!(framed, expected);
    }
}

// Property: an unterminated tail is never emitted
proptest! {
    #[test]
    fn prop_partial_line_stays_pending(tail in "[a-z]{1,40}") {
        let mut framer = LineFramer::new(4096);
        prop_assert_eq!(framer.feed(tail.as_bytes()).count(), 0);
        prop_assert_eq!(framer.pending(), tail.len());
    }
}

// Property: stuffed content never contains a bare terminator line and unstuffs to itself
proptest! {
    #[test]
    fn prop_dot_stuffing_hides_terminator(content in prop::collection::vec(
        prop_oneof![Just(b'.'), Just(b'\r'), Just(b'\n'), any::<u8>()], 0..400)
    ) {
        let mut stuffed = BytesMut::new();
        dot_stuff(&content, &mut stuffed);

        for line in stuffed.split_inclusive(|b| *b == b'\n') {
            prop_assert_ne!(line, &b".\r\n"[..]);
            prop_assert_ne!(line, &b".\n"[..]);
        }
        prop_assert_eq!(dot_unstuff(&stuffed), content);
    }
}

// Property: arbitrary bytes never panic the record decoder
proptest! {
    #[test]
    fn prop_frame_decode_total(data in prop::collection::vec(any::<u8>(), 0..600)) {
        if let Ok((frame, consumed)) = Frame::decode(&data) {
            prop_assert!(consumed <= data.len());
            prop_assert_eq!(frame.encoded_len(), consumed);
            prop_assert_eq!(&frame.to_bytes()[..], &data[..consumed]);
        }
    }
}

// Property: decode reads back what encode wrote, trailing bytes untouched
proptest! {
    #[test]
    fn prop_frame_encode_decode(
        ip in any::<u32>(),
        port in any::<u16>(),
        user in "[a-z]{1,256}",
        file in "[a-zA-Z0-9._-]{1,256}",
        trailing in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let record = FileRecord {
            address: Address::new(Ipv4Addr::from(ip), port),
            user: ShortString::new(user).unwrap(),
            file: ShortString::new(file).unwrap(),
        };
        let frame = Frame::Offer(record);

        let mut data = frame.to_bytes().to_vec();
        data.extend_from_slice(&trailing);

        let (decoded, consumed) = Frame::decode(&data).unwrap();
        prop_assert_eq!(decoded, frame.clone());
        prop_assert_eq!(consumed, frame.encoded_len());
    }
}

// Property: RETR delivers file bytes that unstuff back to the original. A file
// whose last line has no newline gets a CRLF before the terminator, so for
// that case the unstuffed body is the file plus CRLF.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_retr_preserves_content(content in prop::collection::vec(
        prop_oneof![Just(b'.'), Just(b'\r'), Just(b'\n'), any::<u8>()], 0..2000)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let maildrop = dir.path().join("erin");
        std::fs::create_dir(&maildrop).unwrap();
        std::fs::write(maildrop.join("m1"), &content).unwrap();

        let mut session = Session::new(dir.path());
        prop_assert!(session.handle_line("USER erin").is_ok());
        prop_assert!(session.handle_line("PASS pw").is_ok());

        let reply = session.handle_line("RETR 1");
        prop_assert_eq!(reply.text(), format!("{} octets", content.len()));
        match reply.body() {
            Some(Body::Content(body)) => prop_assert_eq!(&body[..], &content[..]),
            other => prop_assert!(false, "unexpected body {:?}", other),
        }

        let mut wire = BytesMut::new();
        encode_reply(&reply, &mut wire);
        let status_end = wire.iter().position(|b| *b == b'\n').unwrap() + 1;
        prop_assert!(wire.ends_with(b".\r\n"));
        let body = &wire[status_end..wire.len() - 3];

        let unterminated = !content.is_empty() && !content.ends_with(b"\n");
        let mut expected = content.clone();
        if unterminated {
            expected.extend_from_slice(b"\r\n");
        }
        prop_assert_eq!(dot_unstuff(body), expected);
        session.close();
    }
}

// Property: transaction commands are refused before login without a state change
proptest! {
    #[test]
    fn prop_transaction_commands_refused_in_authorization(
        keyword in prop_oneof![
            Just("STAT"), Just("LIST"), Just("RETR"), Just("DELE"), Just("NOOP"), Just("RSET"),
            Just("stat"), Just("list"), Just("retr"), Just("dele"), Just("noop"), Just("rset"),
        ],
        arg in "[0-9]{0,3}",
    ) {
        let mut session = Session::new("/nonexistent-base");
        let reply = session.handle_line(&format!("{keyword} {arg}"));
        prop_assert!(!reply.is_ok());
        prop_assert_eq!(session.state(), State::Authorization);
    }
}
