//! Store configuration
//!
//! A JSON file with one required key:
//!
//! ```json
//! { "path": "data/addresses.sds" }
//! ```
//!
//! Every other key is optional and defaults to the behavior of
//! `Store::open`: zero lock retries, locks never expire, fsync on every
//! write, strict parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock::LockPolicy;
use crate::observability::{log_event_with_fields, Event};
use crate::storage::DEFAULT_VERSION;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Options of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file path (required)
    pub path: PathBuf,

    /// Version written into the metadata record of a new file
    #[serde(default = "default_version")]
    pub version: String,

    /// Extra lock attempts after the first one
    #[serde(default)]
    pub lock_retries: u32,

    /// Pause between lock attempts, in milliseconds
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,

    /// Age after which a lock marker counts as abandoned (none: never)
    #[serde(default)]
    pub stale_lock_secs: Option<u64>,

    /// fsync after append and save
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,

    /// Skip undecodable records on load instead of failing
    #[serde(default)]
    pub skip_corrupt_records: bool,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}
fn default_lock_retry_delay_ms() -> u64 {
    50
}
fn default_sync_writes() -> bool {
    true
}

impl StoreConfig {
    /// Default configuration for the store file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: default_version(),
            lock_retries: 0,
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            stale_lock_secs: None,
            sync_writes: default_sync_writes(),
            skip_corrupt_records: false,
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: StoreConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("config", path.display().to_string().as_str()),
                ("store", config.path.display().to_string().as_str()),
            ],
        );

        Ok(config)
    }

    /// Rejects settings no store can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("path must not be empty".into()));
        }

        if self.path.file_name().is_none() {
            return Err(ConfigError::Invalid(format!(
                "path must name a file: '{}'",
                self.path.display()
            )));
        }

        if self.version.is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".into()));
        }

        if self.lock_retries > 0 && self.lock_retry_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "lock_retry_delay_ms must be > 0 when lock_retries is set".into(),
            ));
        }

        if self.stale_lock_secs == Some(0) {
            return Err(ConfigError::Invalid("stale_lock_secs must be > 0".into()));
        }

        Ok(())
    }

    pub fn with_lock_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.lock_retries = retries;
        self.lock_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_stale_lock_after(mut self, max_age: Duration) -> Self {
        self.stale_lock_secs = Some(max_age.as_secs());
        self
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    pub fn with_skip_corrupt_records(mut self, skip: bool) -> Self {
        self.skip_corrupt_records = skip;
        self
    }

    /// Lock policy derived from the lock settings
    pub fn lock_policy(&self) -> LockPolicy {
        let policy = LockPolicy::with_retries(
            self.lock_retries,
            Duration::from_millis(self.lock_retry_delay_ms),
        );
        match self.stale_lock_secs {
            Some(secs) => policy.stale_after(Duration::from_secs(secs)),
            None => policy,
        }
    }

    /// Store file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
