//! File I/O primitives for town state files
//!
//! - **Advisory locks**: per-file exclusive locks with exponential backoff
//! - **Exclusive create**: fail-if-present writes for first records
//! - **Atomic replace**: temp file + rename so readers never see partial JSON

pub mod atomic;
pub mod error;
pub mod lock;

pub use atomic::{create_exclusive, write_atomic};
pub use error::FileError;
pub use lock::{FileLock, acquire_lock};
