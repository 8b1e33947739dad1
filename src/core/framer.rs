//! # Line Framer
//!
//! Reassembles command lines from a byte stream delivered in arbitrary
//! fragments.
//!
//! A line ends at the first `\n`; a `\r` immediately before it belongs to the
//! terminator, so `"\r\n"` wins over a bare `"\n"` whenever both could apply.
//! A `\r` sitting at the end of a chunk stays buffered until the next byte
//! decides. Bytes after the last terminator are carried into the next call.
//!
//! Lines longer than the configured maximum are discarded up to their
//! terminator and reported once as [`Inbound::Overlong`], so a client cannot
//! grow the buffer without bound.

use bytes::BytesMut;

/// One reassembled unit of client input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line, terminator stripped
    Line(String),
    /// A line that exceeded the maximum length and was dropped
    Overlong,
}

/// Stateful line splitter over a caller-owned buffer.
///
/// Used directly by [`LineFramer`] and, through
/// [`Pop3Codec`](crate::core::codec::Pop3Codec), by `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_length: usize,
    /// Offset already scanned for a terminator
    next_index: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Extract the next complete line from `buf`, if any
    pub fn decode(&mut self, buf: &mut BytesMut) -> Option<Inbound> {
        let found = buf[self.next_index..].iter().position(|b| *b == b'\n');

        match found {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut line = buf.split_to(end + 1);

                if self.discarding {
                    self.discarding = false;
                    return Some(Inbound::Overlong);
                }

                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                if line.len() > self.max_length {
                    return Some(Inbound::Overlong);
                }

                Some(Inbound::Line(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                // one spare byte for a pending '\r'
                if buf.len() > self.max_length + 1 {
                    self.discarding = true;
                    buf.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                None
            }
        }
    }

    /// Forget any partial line; used when the stream ends mid-line
    pub fn reset(&mut self, buf: &mut BytesMut) {
        buf.clear();
        self.next_index = 0;
        self.discarding = false;
    }
}

/// Owns a reassembly buffer and yields complete lines per fed chunk.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    decoder: LineDecoder,
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            decoder: LineDecoder::new(max_length),
        }
    }

    /// Append `chunk` and return the lines it completes.
    ///
    /// The iterator is lazy: lines not pulled from it stay buffered and are
    /// yielded first by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer.extend_from_slice(chunk);
        Lines { framer: self }
    }

    /// Bytes of an incomplete line currently held
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Iterator over the lines completed by one [`LineFramer::feed`] call
#[derive(Debug)]
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Inbound;

    fn next(&mut self) -> Option<Self::Item> {
        let framer = &mut *self.framer;
        framer.decoder.decode(&mut framer.buffer)
    }
}
