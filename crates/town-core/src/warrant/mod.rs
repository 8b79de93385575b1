//! Warrant store
//!
//! A warrant is a durable order to terminate a target's session. Each target
//! has exactly one file, `<dir>/<target with '/' → '_'>.warrant.json`, which
//! moves from unexecuted to executed at most once and is never deleted here.
//!
//! ## Duplicate suppression
//!
//! Filing against a target whose warrant is still pending is a no-op. The
//! existence check and the write happen under an exclusive advisory lock on
//! `<stem>.warrant.lock`; fresh files are additionally created with
//! `O_EXCL` so a writer that bypasses the lock still cannot clobber a record.

mod execute;

pub use execute::WarrantExecutor;

use crate::identity::IdentityError;
use crate::io::{FileError, acquire_lock, create_exclusive, write_atomic};
use crate::mux::MuxError;
use crate::process::TerminateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const WARRANT_SUFFIX: &str = ".warrant.json";
const LOCK_SUFFIX: &str = ".warrant.lock";
const LOCK_RETRIES: u32 = 5;

/// Warrant errors
#[derive(Debug, Error)]
pub enum WarrantError {
    #[error("warrant target must not be empty")]
    EmptyTarget,

    /// No warrant file exists for the target
    #[error("no warrant filed for '{target}'")]
    Missing { target: String },

    /// Existing file is not a valid warrant
    #[error("corrupt warrant file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode warrant: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Terminate(#[from] TerminateError),
}

/// Persisted warrant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Warrant {
    #[serde(rename = "ID")]
    pub id: String,
    pub target: String,
    pub reason: String,
    pub filed_by: String,
    pub filed_at: DateTime<Utc>,
    pub executed: bool,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Warrant {
    fn new(target: &str, reason: &str, filed_by: &str) -> Self {
        Self {
            id: format!("warrant-{}", uuid::Uuid::new_v4()),
            target: target.to_string(),
            reason: reason.to_string(),
            filed_by: filed_by.to_string(),
            filed_at: Utc::now(),
            executed: false,
            executed_at: None,
        }
    }
}

/// Result of [`WarrantStore::file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// A new warrant was written
    Filed(Warrant),
    /// An unexecuted warrant already existed and was left untouched
    AlreadyPending(Warrant),
}

impl FileOutcome {
    pub fn warrant(&self) -> &Warrant {
        match self {
            Self::Filed(w) | Self::AlreadyPending(w) => w,
        }
    }
}

/// File stem for `target`: every `/` becomes `_`.
pub fn warrant_file_stem(target: &str) -> String {
    target.replace('/', "_")
}

/// Directory of warrant files.
#[derive(Debug, Clone)]
pub struct WarrantStore {
    dir: PathBuf,
}

impl WarrantStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic warrant path for `target`.
    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir
            .join(format!("{}{WARRANT_SUFFIX}", warrant_file_stem(target)))
    }

    fn lock_path_for(&self, target: &str) -> PathBuf {
        self.dir
            .join(format!("{}{LOCK_SUFFIX}", warrant_file_stem(target)))
    }

    fn ensure_dir(&self) -> Result<(), WarrantError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| FileError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Load the warrant for `target`; `Ok(None)` if none was filed.
    pub fn load(&self, target: &str) -> Result<Option<Warrant>, WarrantError> {
        read_warrant(&self.path_for(target))
    }

    /// All warrants in the store, oldest filing first.
    ///
    /// Unreadable or corrupt files are logged and skipped.
    pub fn list(&self) -> Result<Vec<Warrant>, WarrantError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FileError::Io {
                    path: self.dir.clone(),
                    source: e,
                }
                .into());
            }
        };

        let mut warrants = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_warrant = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(WARRANT_SUFFIX));
            if !is_warrant {
                continue;
            }
            match read_warrant(&path) {
                Ok(Some(warrant)) => warrants.push(warrant),
                Ok(None) => {}
                Err(e) => warn!("Skipping warrant file {}: {e}", path.display()),
            }
        }
        warrants.sort_by(|a, b| a.filed_at.cmp(&b.filed_at).then_with(|| a.target.cmp(&b.target)));
        Ok(warrants)
    }

    /// File a warrant against `target` unless one is already pending.
    pub fn file(
        &self,
        target: &str,
        reason: &str,
        filed_by: &str,
    ) -> Result<FileOutcome, WarrantError> {
        if target.trim().is_empty() {
            return Err(WarrantError::EmptyTarget);
        }
        self.ensure_dir()?;
        let _lock = acquire_lock(&self.lock_path_for(target), LOCK_RETRIES)?;
        let path = self.path_for(target);

        let existing = match read_warrant(&path) {
            Ok(existing) => existing,
            Err(WarrantError::Corrupt { path, source }) => {
                warn!(
                    "Replacing corrupt warrant file {}: {source}",
                    path.display()
                );
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(existing) = existing.filter(|w| !w.executed) {
            debug!(
                "Warrant {} for {target} still pending, not filing again",
                existing.id
            );
            return Ok(FileOutcome::AlreadyPending(existing));
        }

        let warrant = Warrant::new(target, reason, filed_by);
        let bytes = encode(&warrant)?;
        if path.exists() {
            write_atomic(&path, &bytes)?;
        } else {
            match create_exclusive(&path, &bytes) {
                Ok(()) => {}
                Err(FileError::AlreadyExists { .. }) => {
                    // Lost to a writer outside the lock; defer to its record.
                    if let Some(winner) = read_warrant(&path)?.filter(|w| !w.executed) {
                        return Ok(FileOutcome::AlreadyPending(winner));
                    }
                    write_atomic(&path, &bytes)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            "Filed warrant {} against {target} by {filed_by}: {reason}",
            warrant.id
        );
        Ok(FileOutcome::Filed(warrant))
    }

    /// Mark the warrant for `target` executed (no-op if it already is).
    pub fn mark_executed(&self, target: &str) -> Result<Warrant, WarrantError> {
        self.ensure_dir()?;
        let _lock = acquire_lock(&self.lock_path_for(target), LOCK_RETRIES)?;
        let path = self.path_for(target);

        let mut warrant = read_warrant(&path)?.ok_or_else(|| WarrantError::Missing {
            target: target.to_string(),
        })?;
        if warrant.executed {
            debug!("Warrant {} already executed", warrant.id);
            return Ok(warrant);
        }

        warrant.executed = true;
        warrant.executed_at = Some(Utc::now());
        write_atomic(&path, &encode(&warrant)?)?;
        Ok(warrant)
    }
}

fn encode(warrant: &Warrant) -> Result<Vec<u8>, WarrantError> {
    serde_json::to_vec_pretty(warrant).map_err(WarrantError::Encode)
}

fn read_warrant(path: &Path) -> Result<Option<Warrant>, WarrantError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(FileError::Io {
                path: path.to_path_buf(),
                source: e,
            }
            .into());
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| WarrantError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}
