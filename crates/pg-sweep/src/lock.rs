//! Single-instance run lock.
//!
//! Two concurrent sweeps against the same cluster would double the
//! maintenance load and race each other's backend termination, so a run
//! holds an exclusive advisory lock on a well-known file for its whole
//! lifetime. The lock is released when the guard drops, including on panic.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, SweepError};

/// RAII guard for the single-instance lock.
///
/// Holds the lock file open and exclusively locked until dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquire the exclusive run lock, failing fast if another sweep holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(SweepError::AlreadyRunning { path });
            }
            Err(e) => return Err(e.into()),
        }

        // Record the holder's pid so an operator can see who owns the lock
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { file, path })
    }

    /// The lock file path used when none is configured.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("pg-sweep.lock")
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
