//! # POP3 Protocol
//!
//! Command parsing, replies and the per-connection state machine.
//!
//! ## Components
//! - **Command**: keyword recognition and argument arity
//! - **State**: AUTHORIZATION / TRANSACTION / UPDATE and their legal commands
//! - **Reply**: `+OK` / `-ERR` responses with optional multi-line bodies
//! - **Session**: dispatch of commands against a maildrop

pub mod command;
pub mod reply;
pub mod session;
pub mod state;


pub use command::{Command, Keyword, ParseError};
pub use reply::{Body, Reply, Status};
pub use session::Session;
pub use state::State;
