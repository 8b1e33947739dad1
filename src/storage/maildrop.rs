//! # Maildrop Store
//!
//! A maildrop is a per-user directory holding one file per message.
//!
//! Opening a maildrop locks it, then enumerates its non-hidden regular files in
//! lexicographic file-name order and numbers them densely from 1. Numbers never
//! change for the life of the [`Maildrop`], deleted or not.
//!
//! Deletion is staged: [`Maildrop::mark_deleted`] only records the number.
//! Files are unlinked by [`Maildrop::commit`], which also releases the lock.

use crate::error::{Pop3Error, Result};
use crate::storage::lock::{LockHolder, MaildropLock};
use crate::storage::message::Message;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Enumerate the messages of `path` without locking it.
///
/// Hidden entries and anything that is not a readable regular file are
/// skipped.
pub fn scan(path: &Path) -> Result<Vec<Message>> {
    if !path.is_dir() {
        return Err(Pop3Error::MaildropNotFound(path.display().to_string()));
    }

    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        entries.push((name, entry.path()));
    }
    entries.sort();

    let mut messages = Vec::with_capacity(entries.len());
    for (name, file) in entries {
        match Message::probe(messages.len() + 1, file) {
            Some(message) => messages.push(message),
            None => debug!(file = %name, "Skipping invalid maildrop entry"),
        }
    }
    Ok(messages)
}

/// Result of looking up a message number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Present(&'a Message),
    Deleted,
    Missing,
}

/// Outcome of the UPDATE sweep
#[derive(Debug, Default)]
pub struct CommitReport {
    pub removed: Vec<usize>,
    pub failed: Vec<(usize, io::Error)>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Locked, enumerated maildrop owned by one session
#[derive(Debug)]
pub struct Maildrop {
    path: PathBuf,
    messages: Vec<Message>,
    deleted: BTreeSet<usize>,
    lock: MaildropLock,
}

impl Maildrop {
    /// Lock `path` for `holder` and enumerate it.
    ///
    /// On any failure nothing stays locked.
    pub fn open(path: &Path, holder: &LockHolder) -> Result<Self> {
        if !path.is_dir() {
            return Err(Pop3Error::MaildropNotFound(path.display().to_string()));
        }

        let lock = MaildropLock::acquire(path, holder)?;
        let messages = scan(path)?;

        info!(
            maildrop = %path.display(),
            user = %holder.user,
            messages = messages.len(),
            "Maildrop opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            messages,
            deleted: BTreeSet::new(),
            lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All messages present at open time, deleted ones included
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn lookup(&self, number: usize) -> Lookup<'_> {
        let Some(message) = number.checked_sub(1).and_then(|i| self.messages.get(i)) else {
            return Lookup::Missing;
        };
        if self.deleted.contains(&number) {
            Lookup::Deleted
        } else {
            Lookup::Present(message)
        }
    }

    /// Messages not marked for deletion, in number order
    pub fn live(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages
            .iter()
            .filter(move |m| !self.deleted.contains(&m.number()))
    }

    /// Count and total octets of the live messages
    pub fn stat(&self) -> (usize, u64) {
        self.live()
            .fold((0, 0), |(count, size), m| (count + 1, size + m.size()))
    }

    /// Stage `number` for deletion; false when missing or already staged
    pub fn mark_deleted(&mut self, number: usize) -> bool {
        match self.lookup(number) {
            Lookup::Present(_) => self.deleted.insert(number),
            Lookup::Deleted | Lookup::Missing => false,
        }
    }

    pub fn deleted(&self) -> &BTreeSet<usize> {
        &self.deleted
    }

    /// Unmark everything, returning how many marks were cleared
    pub fn reset(&mut self) -> usize {
        let cleared = self.deleted.len();
        self.deleted.clear();
        cleared
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Release the lock without touching any file
    pub fn release(&mut self) {
        self.lock.release();
    }

    /// Unlink every staged message, then release the lock.
    ///
    /// Failures are collected, not rolled back.
    pub fn commit(mut self) -> CommitReport {
        let mut report = CommitReport::default();

        for &number in &self.deleted {
            let Some(message) = self.messages.get(number - 1) else {
                continue;
            };
            match std::fs::remove_file(message.path()) {
                Ok(()) => report.removed.push(number),
                Err(e) => {
                    warn!(
                        number,
                        file = %message.path().display(),
                        error = %e,
                        "Failed to remove deleted message"
                    );
                    report.failed.push((number, e));
                }
            }
        }

        self.lock.release();
        info!(
            maildrop = %self.path.display(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Maildrop committed"
        );
        report
    }
}
