//! # Maildrop Storage
//!
//! File-system backing for sessions: one directory per user, one file per
//! message.
//!
//! ## Components
//! - **Maildrop**: enumeration, numbering, staged deletion and commit
//! - **Lock**: exclusive advisory lock with a holder record
//! - **Message**: numbered handle to a message file

pub mod lock;
pub mod maildrop;
pub mod message;

pub use lock::{LockHolder, MaildropLock};
pub use maildrop::{CommitReport, Lookup, Maildrop};
pub use message::Message;
