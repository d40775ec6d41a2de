//! Single-drainer guard for `process-queue --lock-file`.
//!
//! The lock is a file created exclusively and removed on drop. A lock
//! older than `stale_after` is assumed to belong to a crashed run and is
//! taken over by renaming it aside, so only one contender can claim it.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock {} is held by another run", path.display())]
    Held { path: PathBuf },

    #[error("failed to create lock {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct DrainLock {
    path: PathBuf,
}

impl DrainLock {
    pub fn acquire(path: impl AsRef<Path>, stale_after: Duration) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        match Self::create(&path) {
            Err(LockError::Held { .. }) if Self::is_stale(&path, stale_after) => {
                tracing::warn!(path = %path.display(), "Taking over stale lock");
                Self::take_over(&path, stale_after)
            }
            result => result,
        }
    }

    fn take_over(path: &Path, stale_after: Duration) -> Result<Self, LockError> {
        let mut aside = OsString::from(path.as_os_str());
        aside.push(format!(".stale-{}", std::process::id()));
        let aside = PathBuf::from(aside);

        match std::fs::rename(path, &aside) {
            Ok(()) => {}
            // Another run already moved it; race for a fresh one.
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::create(path),
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        if !Self::is_stale(&aside, stale_after) {
            // A newer run re-created the lock between the check and the rename.
            let _ = std::fs::hard_link(&aside, path);
            let _ = std::fs::remove_file(&aside);
            return Err(LockError::Held {
                path: path.to_path_buf(),
            });
        }

        let _ = std::fs::remove_file(&aside);
        Self::create(path)
    }

    fn create(path: &Path) -> Result<Self, LockError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::Held {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        // Only informational.
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > stale_after)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DrainLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove lock");
        }
    }
}
