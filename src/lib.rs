//! # pop3-maildrop
//!
//! A single-process POP3 server serving per-user maildrop directories.
//!
//! ## Layers
//! - [`core`]: line framing, the reply codec and the binary record format
//!   shared with sibling mail services
//! - [`protocol`]: command parsing and the AUTHORIZATION / TRANSACTION /
//!   UPDATE state machine
//! - [`storage`]: maildrop enumeration, exclusive locking and staged deletion
//! - [`transport`]: the TCP accept loop and connection driver
//!
//! ## Example
//! ```rust,no_run
//! use pop3_maildrop::config::ServerConfig;
//! use pop3_maildrop::transport::start_server;
//!
//! # async fn run() -> pop3_maildrop::error::Result<()> {
//! let config = ServerConfig {
//!     port: 1100,
//!     base_directory: "/var/spool/pop3".into(),
//!     ..ServerConfig::default()
//! };
//! start_server(config).await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod transport;
pub mod utils;

pub use error::{Pop3Error, Result};
