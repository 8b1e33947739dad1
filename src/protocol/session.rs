//! # Protocol Session
//!
//! Per-connection state machine. The session is I/O-free: it consumes
//! reassembled lines and returns [`Reply`] values, leaving sockets to the
//! transport.
//!
//! ## Lifecycle
//! ```text
//! AUTHORIZATION --USER/PASS--> TRANSACTION --QUIT--> UPDATE (commit) --> close
//!       |                            |
//!       +--QUIT--> CLOSED            +--disconnect/timeout--> CLOSED (no commit)
//! ```
//!
//! `QUIT` is checked before state membership and is legal in every live
//! state. Any other keyword outside the current state's table is refused with
//! no state change.

use crate::core::framer::Inbound;
use crate::core::wire::{Address, ShortString};
use crate::error::{constants, Pop3Error};
use crate::protocol::command::{split_keyword, Command, Keyword, ParseError};
use crate::protocol::reply::Reply;
use crate::protocol::state::State;
use crate::storage::message::{header_message_id, id_domain};
use crate::storage::{LockHolder, Lookup, Maildrop, MaildropLock, Message};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handler result: a reply, or the text of a negative reply
type Outcome = std::result::Result<Reply, Cow<'static, str>>;

/// Mailbox selected by a successful USER
#[derive(Debug, Clone)]
struct Candidate {
    name: ShortString,
    path: PathBuf,
}

#[derive(Debug)]
pub struct Session {
    state: State,
    base_directory: PathBuf,
    peer: Option<SocketAddr>,
    greeting: String,
    candidate: Option<Candidate>,
    user: Option<String>,
    maildrop: Option<Maildrop>,
    last_error: Option<String>,
}

impl Session {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            state: State::Authorization,
            base_directory: base_directory.into(),
            peer: None,
            greeting: String::from(crate::config::DEFAULT_GREETING),
            candidate: None,
            user: None,
            maildrop: None,
            last_error: None,
        }
    }

    /// Remote endpoint, recorded in the maildrop lock
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Reply sent as soon as the connection is accepted
    pub fn greeting(&self) -> Reply {
        Reply::ok(self.greeting.clone())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Authenticated user, once in TRANSACTION
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn maildrop(&self) -> Option<&Maildrop> {
        self.maildrop.as_ref()
    }

    /// Text of the most recent negative reply
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The connection must close after the current reply
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn handle_inbound(&mut self, inbound: Inbound) -> Reply {
        match inbound {
            Inbound::Line(line) => self.handle_line(&line),
            Inbound::Overlong => self.reject(constants::ERR_LINE_TOO_LONG),
        }
    }

    /// Process one complete command line
    pub fn handle_line(&mut self, line: &str) -> Reply {
        if self.state.is_terminal() {
            return self.reject(constants::ERR_SESSION_CLOSED);
        }

        let (keyword, rest) = match split_keyword(line) {
            Ok(parts) => parts,
            Err(ParseError::Empty) => return self.reject(constants::ERR_EMPTY_COMMAND),
            Err(_) => return self.reject(constants::ERR_UNKNOWN_COMMAND),
        };

        if keyword != Keyword::Quit && !self.state.permits(keyword) {
            debug!(state = %self.state, %keyword, "Command refused in current state");
            return self.reject(constants::ERR_WRONG_STATE);
        }

        let command = match Command::parse(keyword, rest) {
            Ok(command) => command,
            Err(_) => return self.reject(constants::ERR_SYNTAX),
        };

        debug!(state = %self.state, %command, "Dispatching command");
        let outcome = self.dispatch(command);
        match outcome {
            Ok(reply) => reply,
            Err(text) => self.reject(text),
        }
    }

    fn dispatch(&mut self, command: Command) -> Outcome {
        match (self.state, command) {
            (_, Command::Quit) => self.handle_quit(),
            (State::Authorization, Command::User(name)) => self.handle_user(&name),
            (State::Authorization, Command::Pass(_)) => self.handle_pass(),
            (State::Transaction, Command::Stat) => self.handle_stat(),
            (State::Transaction, Command::List(arg)) => self.handle_list(arg.as_deref()),
            (State::Transaction, Command::Retr(arg)) => self.handle_retr(&arg),
            (State::Transaction, Command::Dele(arg)) => self.handle_dele(&arg),
            (State::Transaction, Command::Noop) => Ok(Reply::ok("")),
            (State::Transaction, Command::Rset) => self.handle_rset(),
            (_, _) => Err(Cow::Borrowed(constants::ERR_WRONG_STATE)),
        }
    }

    fn reject(&mut self, text: impl Into<Cow<'static, str>>) -> Reply {
        let text = text.into().into_owned();
        debug!(state = %self.state, error = %text, "Negative reply");
        self.last_error = Some(text.clone());
        Reply::err(text)
    }

    fn peer_address(&self) -> Address {
        self.peer
            .and_then(|peer| Address::try_from(peer).ok())
            .unwrap_or_else(Address::unspecified)
    }

    fn handle_user(&mut self, name: &str) -> Outcome {
        self.candidate = None;

        let Some(short) = valid_username(name) else {
            return Err(format!("never heard of mailbox {name}").into());
        };

        let path = self.base_directory.join(name);
        if !path.is_dir() {
            return Err(format!("sorry, no mailbox for {name} here").into());
        }

        self.candidate = Some(Candidate { name: short, path });
        Ok(Reply::ok(format!("{name} is a valid mailbox")))
    }

    fn handle_pass(&mut self) -> Outcome {
        let Some(Candidate { name, path }) = self.candidate.clone() else {
            return Err(Cow::Borrowed(constants::ERR_USER_FIRST));
        };

        let holder = LockHolder::new(self.peer_address(), name.clone());
        match Maildrop::open(&path, &holder) {
            Ok(maildrop) => {
                let (count, octets) = maildrop.stat();
                info!(user = %name, messages = count, octets, "User logged in");

                self.candidate = None;
                self.user = Some(name.to_string());
                self.maildrop = Some(maildrop);
                self.state = State::Transaction;
                Ok(Reply::ok(format!(
                    "{name}'s maildrop has {count} messages ({octets} octets)"
                )))
            }
            Err(Pop3Error::MaildropLocked(_)) => {
                match MaildropLock::holder(&path) {
                    Some(current) => warn!(
                        user = %name,
                        held_by = %current.address,
                        "Maildrop already locked"
                    ),
                    None => warn!(user = %name, "Maildrop already locked"),
                }
                Err(Cow::Borrowed(constants::ERR_MAILDROP_LOCKED))
            }
            Err(e) => {
                warn!(user = %name, error = %e, "Unable to open maildrop");
                Err(Cow::Borrowed(constants::ERR_MAILDROP_UNREADABLE))
            }
        }
    }

    fn handle_quit(&mut self) -> Outcome {
        if self.state != State::Transaction {
            self.candidate = None;
            self.state = State::Closed;
            return Ok(Reply::ok("POP3 server signing off"));
        }

        self.state = State::Update;
        let Some(maildrop) = self.maildrop.take() else {
            return Ok(Reply::ok("POP3 server signing off"));
        };

        let report = maildrop.commit();
        if report.is_complete() {
            Ok(Reply::ok(format!(
                "POP3 server signing off ({} messages deleted)",
                report.removed.len()
            )))
        } else {
            Err(Cow::Borrowed(constants::ERR_NOT_REMOVED))
        }
    }

    fn opened(&self) -> Result<&Maildrop, Cow<'static, str>> {
        self.maildrop
            .as_ref()
            .ok_or(Cow::Borrowed(constants::ERR_WRONG_STATE))
    }

    fn opened_mut(&mut self) -> Result<&mut Maildrop, Cow<'static, str>> {
        self.maildrop
            .as_mut()
            .ok_or(Cow::Borrowed(constants::ERR_WRONG_STATE))
    }

    fn handle_stat(&mut self) -> Outcome {
        let (count, octets) = self.opened()?.stat();
        Ok(Reply::ok(format!("{count} {octets}")))
    }

    fn handle_list(&mut self, arg: Option<&str>) -> Outcome {
        let maildrop = self.opened()?;

        let Some(arg) = arg else {
            let (count, octets) = maildrop.stat();
            let lines = maildrop
                .live()
                .map(|m| format!("{} {}", m.number(), m.size()))
                .collect();
            return Ok(Reply::ok(format!("{count} messages ({octets} octets)")).with_lines(lines));
        };

        let message = present(maildrop, arg)?;
        Ok(Reply::ok(format!("{} {}", message.number(), message.size())))
    }

    fn handle_retr(&mut self, arg: &str) -> Outcome {
        let message = present(self.opened()?, arg)?;
        let content = message.read_content().map_err(|e| {
            warn!(number = message.number(), error = %e, "Unable to read message");
            Cow::Borrowed(constants::ERR_MESSAGE_UNREADABLE)
        })?;

        let message_id = header_message_id(&content[..]);
        debug!(
            number = message.number(),
            octets = content.len(),
            domain = ?message_id.as_deref().and_then(id_domain),
            "Sending message"
        );
        Ok(Reply::ok(format!("{} octets", content.len())).with_content(content))
    }

    fn handle_dele(&mut self, arg: &str) -> Outcome {
        let maildrop = self.opened_mut()?;
        let number = parse_number(arg).ok_or(Cow::Borrowed(constants::ERR_NO_SUCH_MESSAGE))?;

        match maildrop.lookup(number) {
            Lookup::Present(_) => {}
            Lookup::Deleted => return Err(format!("message {number} already deleted").into()),
            Lookup::Missing => return Err(Cow::Borrowed(constants::ERR_NO_SUCH_MESSAGE)),
        }

        maildrop.mark_deleted(number);
        Ok(Reply::ok(format!("message {number} deleted")))
    }

    fn handle_rset(&mut self) -> Outcome {
        let cleared = self.opened_mut()?.reset();
        Ok(Reply::ok(format!("{cleared} message(s) unmarked")))
    }

    /// Abrupt teardown: release the maildrop without committing.
    ///
    /// Called by the transport when the connection ends for any reason.
    pub fn close(&mut self) {
        if let Some(mut maildrop) = self.maildrop.take() {
            maildrop.release();
            info!(
                user = self.user.as_deref().unwrap_or_default(),
                staged = maildrop.deleted().len(),
                "Session closed without commit; deletions discarded"
            );
        }
        self.candidate = None;
        if !self.state.is_terminal() {
            self.state = State::Closed;
        }
    }
}

/// A user name usable as a single path component and as a lock record
fn valid_username(name: &str) -> Option<ShortString> {
    if name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return None;
    }
    ShortString::new(name).ok()
}

fn parse_number(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0)
}

/// Resolve `arg` to a live message
fn present<'a>(maildrop: &'a Maildrop, arg: &str) -> Result<&'a Message, Cow<'static, str>> {
    match parse_number(arg).map(|n| maildrop.lookup(n)) {
        Some(Lookup::Present(message)) => Ok(message),
        _ => Err(Cow::Borrowed(constants::ERR_NO_SUCH_MESSAGE)),
    }
}
