//! Server replies.
//!
//! A reply is a status line (`+OK` / `-ERR` plus optional text) and, for
//! multi-line responses, a body. Bodies are dot-stuffed and terminated by the
//! codec, never by the code building the reply.

use bytes::Bytes;
use std::fmt;

/// Positive or negative status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    pub fn marker(self) -> &'static str {
        match self {
            Status::Ok => "+OK",
            Status::Err => "-ERR",
        }
    }
}

/// Payload following a positive status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Independent text lines, each sent with a CRLF terminator
    Lines(Vec<String>),
    /// Raw message content, line terminators preserved
    Content(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status: Status,
    text: String,
    body: Option<Body>,
}

impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            text: text.into(),
            body: None,
        }
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self {
            status: Status::Err,
            text: text.into(),
            body: None,
        }
    }

    /// Attach a listing body; the reply becomes multi-line
    pub fn with_lines(mut self, lines: Vec<String>) -> Self {
        self.body = Some(Body::Lines(lines));
        self
    }

    /// Attach message content; the reply becomes multi-line
    pub fn with_content(mut self, content: Bytes) -> Self {
        self.body = Some(Body::Content(content));
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn is_multiline(&self) -> bool {
        self.body.is_some()
    }
}

/// Formats the status line only, without terminator
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            f.write_str(self.status.marker())
        } else {
            write!(f, "{} {}", self.status.marker(), self.text)
        }
    }
}
