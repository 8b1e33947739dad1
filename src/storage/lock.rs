//! # Maildrop Lock
//!
//! Exclusive advisory lock on a user's maildrop directory.
//!
//! The lock is an OS file lock taken without blocking on `<maildrop>/.pop3.lock`.
//! Each acquisition opens the file anew, so two sessions in the same process
//! exclude each other just like two processes do. Acquisition is attempted
//! once; contention is reported, never waited on.
//!
//! While held, the lock file carries a holder record in the wire format of
//! [`crate::core::wire`]: the peer address followed by the username.

use crate::core::wire::{Address, ShortString, ADDRESS_SIZE};
use crate::error::{Pop3Error, Result};
use bytes::BytesMut;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the lock file inside each maildrop; hidden, so never enumerated
pub const LOCK_FILE_NAME: &str = ".pop3.lock";

/// Who holds a maildrop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub address: Address,
    pub user: ShortString,
}

impl LockHolder {
    pub fn new(address: Address, user: ShortString) -> Self {
        Self { address, user }
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(ADDRESS_SIZE + self.user.encoded_len());
        self.address.encode(&mut buf);
        self.user.encode(&mut buf);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut src = data;
        Ok(Self {
            address: Address::decode(&mut src)?,
            user: ShortString::decode(&mut src)?,
        })
    }
}

/// Held lock on one maildrop; released on [`release`](Self::release) or drop
#[derive(Debug)]
pub struct MaildropLock {
    path: PathBuf,
    file: Option<File>,
}

impl MaildropLock {
    /// Take the exclusive lock on `maildrop` for `holder`.
    ///
    /// Fails with [`Pop3Error::MaildropLocked`] when another session holds it
    /// and with [`Pop3Error::Lock`] when the file system refuses.
    pub fn acquire(maildrop: &Path, holder: &LockHolder) -> Result<Self> {
        let path = maildrop.join(LOCK_FILE_NAME);
        let lock_error = |source| Pop3Error::Lock {
            path: path.display().to_string(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(Pop3Error::MaildropLocked(maildrop.display().to_string()));
            }
            Err(TryLockError::Error(source)) => return Err(lock_error(source)),
        }

        let mut lock = Self {
            path,
            file: Some(file),
        };
        if let Err(e) = lock.record(holder) {
            debug!(error = %e, path = %lock.path.display(), "Could not write lock holder record");
        }
        Ok(lock)
    }

    fn record(&mut self, holder: &LockHolder) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&holder.to_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    /// Read the holder record of `maildrop`, if one is present and readable
    pub fn holder(maildrop: &Path) -> Option<LockHolder> {
        let data = std::fs::read(maildrop.join(LOCK_FILE_NAME)).ok()?;
        if data.is_empty() {
            return None;
        }
        LockHolder::from_bytes(&data).ok()
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the lock. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.set_len(0) {
                debug!(error = %e, "Could not clear lock holder record");
            }
            if let Err(e) = file.unlock() {
                warn!(error = %e, path = %self.path.display(), "Failed to unlock maildrop");
            }
            debug!(path = %self.path.display(), "Maildrop lock released");
        }
    }
}

impl Drop for MaildropLock {
    fn drop(&mut self) {
        self.release();
    }
}
