//! Command keywords and parsing.
//!
//! A line splits on its first whitespace run into a keyword and an argument
//! string. The keyword is matched case-insensitively; arity is checked per
//! command before anything runs.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    User,
    Pass,
    Quit,
    Stat,
    List,
    Retr,
    Dele,
    Noop,
    Rset,
}

impl Keyword {
    pub const ALL: &'static [Keyword] = &[
        Keyword::User,
        Keyword::Pass,
        Keyword::Quit,
        Keyword::Stat,
        Keyword::List,
        Keyword::Retr,
        Keyword::Dele,
        Keyword::Noop,
        Keyword::Rset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::User => "USER",
            Keyword::Pass => "PASS",
            Keyword::Quit => "QUIT",
            Keyword::Stat => "STAT",
            Keyword::List => "LIST",
            Keyword::Retr => "RETR",
            Keyword::Dele => "DELE",
            Keyword::Noop => "NOOP",
            Keyword::Rset => "RSET",
        }
    }

    /// Accepted argument count: minimum and optional maximum
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Keyword::User | Keyword::Retr | Keyword::Dele => (1, Some(1)),
            // the secret is the rest of the line and may contain spaces
            Keyword::Pass => (1, None),
            Keyword::List => (0, Some(1)),
            Keyword::Quit | Keyword::Stat | Keyword::Noop | Keyword::Rset => (0, Some(0)),
        }
    }
}

impl FromStr for Keyword {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyword::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownKeyword(s.to_string()))
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a line could not become a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownKeyword(String),
    Syntax(Keyword),
}

/// A fully validated client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Quit,
    Stat,
    List(Option<String>),
    Retr(String),
    Dele(String),
    Noop,
    Rset,
}

/// Split a line into its keyword and the untouched remainder
pub fn split_keyword(line: &str) -> Result<(Keyword, &str), ParseError> {
    let line = line.trim_start();
    if line.trim_end().is_empty() {
        return Err(ParseError::Empty);
    }

    let (word, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    };

    Ok((word.parse::<Keyword>()?, rest))
}

impl Command {
    /// Build the command for `keyword` from its argument string
    pub fn parse(keyword: Keyword, rest: &str) -> Result<Self, ParseError> {
        let args: Vec<&str> = rest.split_whitespace().collect();
        let (min, max) = keyword.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ParseError::Syntax(keyword));
        }

        let first = args.first().map(|arg| (*arg).to_string());
        let command = match keyword {
            Keyword::User => Command::User(first.unwrap_or_default()),
            Keyword::Pass => Command::Pass(rest.trim_end().to_string()),
            Keyword::Quit => Command::Quit,
            Keyword::Stat => Command::Stat,
            Keyword::List => Command::List(first),
            Keyword::Retr => Command::Retr(first.unwrap_or_default()),
            Keyword::Dele => Command::Dele(first.unwrap_or_default()),
            Keyword::Noop => Command::Noop,
            Keyword::Rset => Command::Rset,
        };
        Ok(command)
    }

    /// Parse a whole line
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let (keyword, rest) = split_keyword(line)?;
        Self::parse(keyword, rest)
    }

    pub fn keyword(&self) -> Keyword {
        match self {
            Command::User(_) => Keyword::User,
            Command::Pass(_) => Keyword::Pass,
            Command::Quit => Keyword::Quit,
            Command::Stat => Keyword::Stat,
            Command::List(_) => Keyword::List,
            Command::Retr(_) => Keyword::Retr,
            Command::Dele(_) => Keyword::Dele,
            Command::Noop => Keyword::Noop,
            Command::Rset => Keyword::Rset,
        }
    }
}

/// Log-safe rendering: the PASS secret is masked
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::User(name) => write!(f, "USER {name}"),
            Command::Pass(_) => f.write_str("PASS ****"),
            Command::List(Some(arg)) => write!(f, "LIST {arg}"),
            Command::Retr(arg) => write!(f, "RETR {arg}"),
            Command::Dele(arg) => write!(f, "DELE {arg}"),
            other => f.write_str(other.keyword().as_str()),
        }
    }
}
