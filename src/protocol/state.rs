//! Session lifecycle states and the commands each one admits.

use crate::protocol::command::Keyword;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Greeting sent, waiting for USER/PASS
    Authorization,
    /// Maildrop locked and enumerated
    Transaction,
    /// Staged deletions committed; the connection closes next
    Update,
    /// Torn down without a commit (QUIT before login, disconnect, I/O error)
    Closed,
}

const AUTHORIZATION_KEYWORDS: &[Keyword] = &[Keyword::User, Keyword::Pass, Keyword::Quit];

const TRANSACTION_KEYWORDS: &[Keyword] = &[
    Keyword::Stat,
    Keyword::List,
    Keyword::Retr,
    Keyword::Dele,
    Keyword::Noop,
    Keyword::Rset,
    Keyword::Quit,
];

impl State {
    /// Keywords a client may issue in this state
    pub const fn legal_keywords(self) -> &'static [Keyword] {
        match self {
            State::Authorization => AUTHORIZATION_KEYWORDS,
            State::Transaction => TRANSACTION_KEYWORDS,
            State::Update | State::Closed => &[],
        }
    }

    pub fn permits(self, keyword: Keyword) -> bool {
        self.legal_keywords().contains(&keyword)
    }

    /// No further commands are processed once terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Update | State::Closed)
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Authorization => "AUTHORIZATION",
            State::Transaction => "TRANSACTION",
            State::Update => "UPDATE",
            State::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
