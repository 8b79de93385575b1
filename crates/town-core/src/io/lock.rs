//! File locking with backoff retry

use crate::io::error::FileError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File lock guard that releases the lock on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquire an exclusive advisory lock on `path` with backoff retry.
///
/// The lock file is created if missing and never removed; only the lock held
/// on it matters. Backoff doubles from 50ms:
/// - Attempt 0: no wait
/// - Attempt 1: 50ms
/// - Attempt 2: 100ms
/// - Attempt 3: 200ms
/// - ...
///
/// # Errors
///
/// Returns `FileError::LockTimeout` if the lock is still contended after
/// `max_retries` retries, `FileError::Io` for any other failure.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<FileLock, FileError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| FileError::io(path, e))?;

    for attempt in 0..=max_retries {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(FileLock {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if attempt < max_retries {
                    let wait_ms = 50u64 * (1 << attempt);
                    std::thread::sleep(Duration::from_millis(wait_ms));
                }
            }
            Err(e) => return Err(FileError::io(path, e)),
        }
    }

    Err(FileError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}
