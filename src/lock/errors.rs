//! Lock errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock acquisition and release failures.
///
/// The three variants are kept apart so a caller can retry on
/// contention, abort on a missing directory and report everything else.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("store is locked: marker {} already exists", marker.display())]
    Contended { marker: PathBuf },

    #[error("store directory does not exist: {}", dir.display())]
    DirectoryMissing { dir: PathBuf },

    #[error("lock marker I/O failed for {}: {source}", marker.display())]
    Io {
        marker: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    /// Returns whether the failure was contention with another owner
    pub fn is_contended(&self) -> bool {
        matches!(self, LockError::Contended { .. })
    }
}
