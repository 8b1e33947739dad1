//! # POP3 Codec
//!
//! `tokio_util` codec pairing the [`LineDecoder`] for inbound commands with
//! the reply encoder.
//!
//! ## Reply Encoding
//! ```text
//! single-line   <+OK|-ERR>[ <text>]\r\n
//! multi-line    <+OK|-ERR>[ <text>]\r\n <dot-stuffed body> .\r\n
//! ```
//! Every body line starting with `.` gets one extra leading `.`. Message
//! content is sent with its own line terminators; a final CRLF is added when
//! the content does not end with a newline so the terminator stays on its own
//! line.

use crate::core::framer::{Inbound, LineDecoder};
use crate::error::Pop3Error;
use crate::protocol::reply::{Body, Reply};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";
const TERMINATOR: &[u8] = b".\r\n";

/// Line-in, reply-out codec for one connection
#[derive(Debug, Clone)]
pub struct Pop3Codec {
    lines: LineDecoder,
}

impl Pop3Codec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            lines: LineDecoder::new(max_line_length),
        }
    }
}

impl Decoder for Pop3Codec {
    type Item = Inbound;
    type Error = Pop3Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode(src) {
            Some(item) => Ok(Some(item)),
            None => {
                // an unterminated trailing line is never dispatched
                self.lines.reset(src);
                Ok(None)
            }
        }
    }
}

impl Encoder<Reply> for Pop3Codec {
    type Error = Pop3Error;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_reply(&reply, dst);
        Ok(())
    }
}

/// Write the wire form of `reply` into `dst`
pub fn encode_reply(reply: &Reply, dst: &mut BytesMut) {
    let status_line = reply.to_string();
    dst.reserve(status_line.len() + CRLF.len());
    dst.put_slice(status_line.as_bytes());
    dst.put_slice(CRLF);

    let Some(body) = reply.body() else {
        return;
    };

    match body {
        Body::Lines(lines) => {
            for line in lines {
                dot_stuff(line.as_bytes(), dst);
                dst.put_slice(CRLF);
            }
        }
        Body::Content(content) => {
            dot_stuff(content, dst);
            if !content.is_empty() && !content.ends_with(b"\n") {
                dst.put_slice(CRLF);
            }
        }
    }
    dst.put_slice(TERMINATOR);
}

/// Copy `content` into `dst`, doubling a `.` at the start of every line
pub fn dot_stuff(content: &[u8], dst: &mut BytesMut) {
    dst.reserve(content.len());
    for line in content.split_inclusive(|b| *b == b'\n') {
        if line.first() == Some(&b'.') {
            dst.put_u8(b'.');
        }
        dst.put_slice(line);
    }
}

/// Reverse [`dot_stuff`] on a multi-line body received without its
/// terminating `.` line
pub fn dot_unstuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    for line in body.split_inclusive(|b| *b == b'\n') {
        match line.strip_prefix(b".") {
            Some(rest) => out.extend_from_slice(rest),
            None => out.extend_from_slice(line),
        }
    }
    out
}
