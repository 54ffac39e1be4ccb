//! # Data Directory Lock
//!
//! One node process per data directory. [`FileStorage`](super::FileStorage)
//! takes an exclusive `fs2` lock on `<root>/LOCK` when it opens and holds it
//! until dropped. The file records the holder's PID for the error message.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from taking the data directory lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to create lock file {}: {source}", .path.display())]
    CreateFailed { path: PathBuf, source: io::Error },

    #[error("{} already in use{}", .path.display(), holder(.pid))]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },

    #[error("failed to write PID to {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Exclusive lock on a data directory, released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Take the lock on `dir` without blocking.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(Self::LOCK_FILE);

        // No truncate here: the holder's PID must stay readable.
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        if file.try_lock_exclusive().is_err() {
            let pid = read_pid(&path);
            return Err(LockError::AlreadyLocked { pid, path });
        }

        let write_pid = |file: &mut File| -> io::Result<()> {
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
            file.sync_all()
        };
        write_pid(&mut file).map_err(|source| LockError::WriteFailed {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "[node] data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn holder(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" by process {p}")).unwrap_or_default()
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
