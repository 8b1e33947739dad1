//! # Transport Layer
//!
//! TCP listener and per-connection driver. All sockets are served from one
//! thread by the tokio reactor; each connection is a task owning its framed
//! stream and its [`Session`](crate::protocol::session::Session).

pub mod server;

pub use server::{serve, serve_with_shutdown, start_server};
