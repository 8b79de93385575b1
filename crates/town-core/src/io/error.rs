//! Error types for state-file I/O

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by locking and atomic file writes
#[derive(Error, Debug)]
pub enum FileError {
    /// Failed to acquire the advisory lock after all retries
    #[error("Failed to acquire lock on {path} after {retries} retries")]
    LockTimeout { path: PathBuf, retries: u32 },

    /// File already exists (exclusive create lost the race)
    #[error("File already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FileError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
