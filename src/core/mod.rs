//! # Core Protocol Components
//!
//! Low-level byte handling shared by the server.
//!
//! ## Components
//! - **Framer**: reassembles CRLF/LF command lines from fragmented input
//! - **Codec**: Tokio codec for framing commands and encoding replies
//! - **Wire**: fixed-layout binary records (address, short string, gossip frames)
//!
//! ## Limits
//! - Command lines are capped (default 4 KiB); longer lines are discarded
//! - Short strings carry 1 to 256 bytes of UTF-8

pub mod codec;
pub mod framer;
pub mod wire;
