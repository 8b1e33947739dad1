//! # Error Types
//!
//! Error handling for the POP3 server.
//!
//! Only resource and transport failures are represented here. Protocol errors
//! (unknown command, wrong state, wrong arity) never become a [`Pop3Error`]:
//! the session answers them with a `-ERR` reply and keeps the connection open.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Maildrop Errors**: missing maildrop, lock contention, unreadable messages
//! - **Wire Errors**: malformed binary records in the collaborator formats
//! - **Configuration Errors**: invalid startup settings
//!
//! ## Example Usage
//! ```rust
//! use pop3_maildrop::error::{Pop3Error, Result};
//! use std::path::Path;
//!
//! fn require_dir(path: &Path) -> Result<()> {
//!     if path.is_dir() {
//!         Ok(())
//!     } else {
//!         Err(Pop3Error::MaildropNotFound(path.display().to_string()))
//!     }
//! }
//!
//! assert!(require_dir(Path::new("/definitely/not/here")).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Reply texts for negative responses.
/// Static strings keep reply wording in one place and avoid allocations.
pub mod constants {
    /// Command dispatch errors
    pub const ERR_UNKNOWN_COMMAND: &str = "unknown command";
    pub const ERR_WRONG_STATE: &str = "command not valid in this state";
    pub const ERR_SYNTAX: &str = "syntax error";
    pub const ERR_EMPTY_COMMAND: &str = "empty command";
    pub const ERR_LINE_TOO_LONG: &str = "line too long";

    /// Authorization errors
    pub const ERR_USER_FIRST: &str = "USER required first";
    pub const ERR_MAILDROP_LOCKED: &str = "unable to lock maildrop";
    pub const ERR_MAILDROP_UNREADABLE: &str = "unable to open maildrop";

    /// Transaction errors
    pub const ERR_NO_SUCH_MESSAGE: &str = "no such message";
    pub const ERR_MESSAGE_UNREADABLE: &str = "unable to read message";

    /// Update errors
    pub const ERR_NOT_REMOVED: &str = "some deleted messages not removed";

    /// Session lifecycle errors
    pub const ERR_SESSION_CLOSED: &str = "session closed";
    pub const ERR_AUTOLOGOUT: &str = "autologout timer expired";
}

/// Primary error type for all server operations.
#[derive(Error, Debug)]
pub enum Pop3Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Maildrop not found: {0}")]
    MaildropNotFound(String),

    #[error("Maildrop already locked: {0}")]
    MaildropLocked(String),

    #[error("Lock error on {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Truncated record: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown frame type: {0}")]
    UnknownFrameType(u8),

    #[error("Invalid string length: {0} (expected 1..=256)")]
    InvalidStringLength(usize),

    #[error("Invalid UTF-8 in record: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using Pop3Error
pub type Result<T> = std::result::Result<T, Pop3Error>;
