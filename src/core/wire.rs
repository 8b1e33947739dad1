//! # Fixed-Layout Binary Records
//!
//! Encoding shared by the peer-discovery beacon and the gossip exchange, and
//! reused by the maildrop lock to record who holds it.
//!
//! ## Wire Format
//! ```text
//! Address      [IPv4(4)] [Port(2, big-endian)]
//! ShortString  [N(1)] [UTF-8 data(N)]            N in 1..=256, 0x00 encodes 256
//! Frame        [Type(1)] [Address(6)] [User] [File]
//! Beacon       [Type(1)] [Address(6)] [User]
//! ```
//!
//! Frames carry no length field; their size follows from the layout, so
//! [`Frame::decode`] reports how many bytes it consumed.

use crate::error::{Pop3Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Encoded size of an [`Address`]
pub const ADDRESS_SIZE: usize = 6;

/// Longest payload a [`ShortString`] can carry
pub const MAX_STRING_LEN: usize = 256;

fn ensure(src: &impl Buf, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(Pop3Error::Truncated {
            needed,
            available: src.remaining(),
        });
    }
    Ok(())
}

/// IPv4 endpoint encoded on 6 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    ip: Ipv4Addr,
    port: u16,
}

impl Address {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Placeholder used when the peer is not reachable over IPv4
    pub fn unspecified() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, 0)
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.ip.octets());
        dst.put_u16(self.port);
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self> {
        ensure(&*src, ADDRESS_SIZE)?;
        let mut octets = [0u8; 4];
        src.copy_to_slice(&mut octets);
        let port = src.get_u16();
        Ok(Self::new(Ipv4Addr::from(octets), port))
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl TryFrom<SocketAddr> for Address {
    type Error = Pop3Error;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
                Some(ip) => Ok(Self::new(ip, v6.port())),
                None => Err(Pop3Error::InvalidAddress(addr.to_string())),
            },
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Length-prefixed UTF-8 string of 1 to 256 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortString(String);

impl ShortString {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_STRING_LEN {
            return Err(Pop3Error::InvalidStringLength(value.len()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.0.len()
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        // 256 wraps to 0x00
        dst.put_u8(self.0.len() as u8);
        dst.put_slice(self.0.as_bytes());
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self> {
        ensure(&*src, 1)?;
        let len = match src.get_u8() {
            0 => MAX_STRING_LEN,
            n => usize::from(n),
        };
        ensure(&*src, len)?;
        let mut data = vec![0u8; len];
        src.copy_to_slice(&mut data);
        Ok(Self(String::from_utf8(data)?))
    }
}

impl TryFrom<&str> for ShortString {
    type Error = Pop3Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for ShortString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-byte frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Offer,
    Request,
    Delete,
    Beacon,
}

impl FrameType {
    pub fn code(self) -> u8 {
        match self {
            FrameType::Offer => 1,
            FrameType::Request => 2,
            FrameType::Delete => 3,
            FrameType::Beacon => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FrameType::Offer),
            2 => Some(FrameType::Request),
            3 => Some(FrameType::Delete),
            4 => Some(FrameType::Beacon),
            _ => None,
        }
    }
}

/// File reference carried by offer, request and delete frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub address: Address,
    pub user: ShortString,
    pub file: ShortString,
}

impl FileRecord {
    fn encoded_len(&self) -> usize {
        ADDRESS_SIZE + self.user.encoded_len() + self.file.encoded_len()
    }

    fn encode(&self, dst: &mut impl BufMut) {
        self.address.encode(dst);
        self.user.encode(dst);
        self.file.encode(dst);
    }

    fn decode(src: &mut impl Buf) -> Result<Self> {
        Ok(Self {
            address: Address::decode(src)?,
            user: ShortString::decode(src)?,
            file: ShortString::decode(src)?,
        })
    }
}

/// Discovery and gossip frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Offer(FileRecord),
    Request(FileRecord),
    Delete(FileRecord),
    Beacon { address: Address, user: ShortString },
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Offer(_) => FrameType::Offer,
            Frame::Request(_) => FrameType::Request,
            Frame::Delete(_) => FrameType::Delete,
            Frame::Beacon { .. } => FrameType::Beacon,
        }
    }

    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Frame::Offer(record) | Frame::Request(record) | Frame::Delete(record) => {
                record.encoded_len()
            }
            Frame::Beacon { user, .. } => ADDRESS_SIZE + user.encoded_len(),
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.frame_type().code());
        match self {
            Frame::Offer(record) | Frame::Request(record) | Frame::Delete(record) => {
                record.encode(dst)
            }
            Frame::Beacon { address, user } => {
                address.encode(dst);
                user.encode(dst);
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut dst);
        dst.freeze()
    }

    /// Decode one frame from the front of `data`, returning it with the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let mut src = data;
        ensure(&src, 1)?;
        let code = src.get_u8();
        let frame_type = FrameType::from_code(code).ok_or(Pop3Error::UnknownFrameType(code))?;

        let frame = match frame_type {
            FrameType::Offer => Frame::Offer(FileRecord::decode(&mut src)?),
            FrameType::Request => Frame::Request(FileRecord::decode(&mut src)?),
            FrameType::Delete => Frame::Delete(FileRecord::decode(&mut src)?),
            FrameType::Beacon => Frame::Beacon {
                address: Address::decode(&mut src)?,
                user: ShortString::decode(&mut src)?,
            },
        };

        Ok((frame, data.len() - src.len()))
    }
}
