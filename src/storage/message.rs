//! Numbered handles to message files.

use crate::error::Result;
use bytes::Bytes;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Header bytes inspected when looking for a `Message-ID`
const HEADER_SCAN_LIMIT: u64 = 64 * 1024;

/// One message of an opened maildrop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    number: usize,
    size: u64,
    path: PathBuf,
}

impl Message {
    /// Build a handle for `path`, or `None` when the file is not a readable
    /// regular file.
    pub(crate) fn probe(number: usize, path: PathBuf) -> Option<Self> {
        let metadata = std::fs::metadata(&path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        File::open(&path).ok()?;

        Some(Self {
            number,
            size: metadata.len(),
            path,
        })
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Size in octets at enumeration time
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Message-ID` header value without angle brackets.
    ///
    /// Read from the file on each call.
    pub fn message_id(&self) -> Option<String> {
        let file = File::open(&self.path).ok()?;
        header_message_id(BufReader::new(file.take(HEADER_SCAN_LIMIT)))
    }

    /// Domain part of the `Message-ID`
    pub fn domain(&self) -> Option<String> {
        self.message_id().as_deref().and_then(id_domain).map(String::from)
    }

    /// Read the full file content
    pub fn read_content(&self) -> Result<Bytes> {
        Ok(Bytes::from(std::fs::read(&self.path)?))
    }
}

/// Scan a header block for a `Message-ID` field, joining folded lines.
///
/// Stops at the first empty line, so a `Message-ID` in the body is ignored.
pub fn header_message_id(reader: impl BufRead) -> Option<String> {
    let mut value: Option<String> = None;

    for line in reader.split(b'\n') {
        let line = line.ok()?;
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            break;
        }

        if let Some(current) = value.as_mut() {
            if line.starts_with([' ', '\t']) {
                current.push_str(line.trim());
                continue;
            }
            break;
        }

        if let Some((name, rest)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("message-id") {
                value = Some(rest.trim().to_string());
            }
        }
    }

    value
        .map(|v| v.trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|v| !v.is_empty())
}

/// Domain part of a message id, after the last `@`
pub fn id_domain(id: &str) -> Option<&str> {
    id.rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
