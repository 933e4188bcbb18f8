//! File-based locking that keeps a single updater per database directory.
//!
//! The lock is an advisory `flock` on a named file. It protects against other
//! processes only; within one process the same handle may be acquired again.

use std::fs::{DirBuilder, File, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

use crate::error_handling::LockError;

/// A file lock using `flock`.
///
/// The lock is released by [`FileLock::release`] or, failing that, when the
/// value is dropped. The lock file itself is never removed.
pub struct FileLock {
    path: PathBuf,
    held: Option<Flock<File>>,
}

impl FileLock {
    /// Prepares a lock at `path`, creating its parent directory (mode 0750)
    /// if needed. The lock is not acquired yet.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            DirBuilder::new()
                .recursive(true)
                .mode(0o750)
                .create(parent)
                .map_err(|err| LockError::CreateDir {
                    path: parent.to_path_buf(),
                    err,
                })?;
        }

        debug!("Initializing file lock at {}", path.display());
        Ok(Self { path, held: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Tries to take the lock without blocking.
    ///
    /// Returns [`LockError::Busy`] when another process holds it. Acquiring a
    /// handle that is already held is a no-op.
    pub fn acquire(&mut self) -> Result<(), LockError> {
        if self.held.is_some() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&self.path)
            .map_err(|err| LockError::Open {
                path: self.path.clone(),
                err,
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!("Acquired lock file at {}", self.path.display());
                self.held = Some(lock);
                Ok(())
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(LockError::Busy(self.path.clone())),
            Err((_, err)) => Err(LockError::Acquire {
                path: self.path.clone(),
                err,
            }),
        }
    }

    /// Releases the lock. Releasing a lock that is not held is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        let Some(lock) = self.held.take() else {
            return Ok(());
        };

        match lock.unlock() {
            Ok(_file) => {
                debug!("Lock file {} successfully released", self.path.display());
                Ok(())
            }
            Err((lock, err)) => {
                // Dropping the guard retries the unlock and closes the descriptor.
                drop(lock);
                Err(LockError::Release {
                    path: self.path.clone(),
                    err,
                })
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("{}", err);
        }
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("held", &self.is_held())
            .finish()
    }
}
