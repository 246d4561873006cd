//! Freshness tracking for the in-memory cache
//!
//! A token records the store file's modification time and size at the
//! last load or write. The cache is stale when no token exists or the
//! file's current mtime is strictly later than the token's. Size is kept
//! for diagnostics only.
//!
//! A write that lands within the same filesystem timestamp tick as the
//! recorded stamp is not detected.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use super::errors::{StoreError, StoreResult};

/// `(mtime, size)` of the store file at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    mtime: SystemTime,
    size: u64,
}

impl FreshnessToken {
    /// Builds a token from already fetched file metadata.
    pub fn from_metadata(metadata: &Metadata) -> io::Result<Self> {
        Ok(Self {
            mtime: metadata.modified()?,
            size: metadata.len(),
        })
    }

    /// Modification time of the file when stamped
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// Size of the file in bytes when stamped
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Reads the current token of `path`.
pub fn stamp(path: &Path) -> StoreResult<FreshnessToken> {
    fs::metadata(path)
        .and_then(|m| FreshnessToken::from_metadata(&m))
        .map_err(|e| {
            StoreError::io_error(format!("Failed to stat store file: {}", path.display()), e)
        })
}

/// Returns whether a cache stamped with `token` is stale for `path`.
///
/// An inaccessible file counts as stale; the reload that follows
/// reports the actual error.
pub fn is_stale(token: Option<&FreshnessToken>, path: &Path) -> bool {
    let Some(token) = token else {
        return true;
    };

    match stamp(path) {
        Ok(current) => current.mtime > token.mtime,
        Err(_) => true,
    }
}
