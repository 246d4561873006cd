//! Store error types
//!
//! Error codes:
//! - SDS_STORE_IO_ERROR (file missing mid-operation, permission denied)
//! - SDS_STORE_WRITE_FAILED (append or rewrite could not complete)
//! - SDS_RECORD_PARSE_ERROR (a record of an existing file is not valid JSON)
//! - SDS_MISSING_METADATA (the file holds no metadata record at all)
//! - SDS_LOCK_CONTENDED (another owner holds the lock marker)
//! - SDS_LOCK_IO_ERROR (lock marker could not be created or removed)
//! - SDS_LOCK_DIRECTORY_MISSING (store directory does not exist)
//! - SDS_INVALID_CONFIG (store configuration rejected before opening)

use std::fmt;
use std::io;

use crate::lock::LockError;

/// Store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Disk I/O failure while reading or stat'ing the store file
    SdsStoreIoError,
    /// Document write failed
    SdsStoreWriteFailed,
    /// Malformed JSON in an existing record
    SdsRecordParseError,
    /// Store file is empty, no metadata record
    SdsMissingMetadata,
    /// Lock marker already present
    SdsLockContended,
    /// Lock marker could not be created or removed
    SdsLockIoError,
    /// Directory of the store file does not exist
    SdsLockDirectoryMissing,
    /// Configuration failed validation
    SdsInvalidConfig,
}

impl StoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::SdsStoreIoError => "SDS_STORE_IO_ERROR",
            StoreErrorCode::SdsStoreWriteFailed => "SDS_STORE_WRITE_FAILED",
            StoreErrorCode::SdsRecordParseError => "SDS_RECORD_PARSE_ERROR",
            StoreErrorCode::SdsMissingMetadata => "SDS_MISSING_METADATA",
            StoreErrorCode::SdsLockContended => "SDS_LOCK_CONTENDED",
            StoreErrorCode::SdsLockIoError => "SDS_LOCK_IO_ERROR",
            StoreErrorCode::SdsLockDirectoryMissing => "SDS_LOCK_DIRECTORY_MISSING",
            StoreErrorCode::SdsInvalidConfig => "SDS_INVALID_CONFIG",
        }
    }

    /// Returns whether the code belongs to the lock category
    pub fn is_lock(&self) -> bool {
        matches!(
            self,
            StoreErrorCode::SdsLockContended
                | StoreErrorCode::SdsLockIoError
                | StoreErrorCode::SdsLockDirectoryMissing
        )
    }

    /// Returns whether the code means the file content could not be decoded
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            StoreErrorCode::SdsRecordParseError | StoreErrorCode::SdsMissingMetadata
        )
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error type with full context
#[derive(Debug)]
pub struct StoreError {
    /// Error code
    code: StoreErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying error if applicable
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StoreError {
    fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a new store I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StoreErrorCode::SdsStoreIoError, message).with_source(source)
    }

    /// Create a new write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StoreErrorCode::SdsStoreWriteFailed, message).with_source(source)
    }

    /// Create a write failed error caused by an encoding failure
    pub fn encode_failed(source: serde_json::Error) -> Self {
        Self::new(
            StoreErrorCode::SdsStoreWriteFailed,
            "Failed to encode document as JSON",
        )
        .with_source(source)
    }

    /// Create a parse error for the record at `index` (0 is the metadata record)
    pub fn parse_error(index: usize, source: serde_json::Error) -> Self {
        let mut err = Self::new(
            StoreErrorCode::SdsRecordParseError,
            format!("Malformed JSON record: {}", source),
        )
        .with_source(source);
        err.details = Some(format!("record_index: {}", index));
        err
    }

    /// Create a parse error for a file that is not valid UTF-8
    pub fn invalid_utf8(source: std::string::FromUtf8Error) -> Self {
        let mut err = Self::new(
            StoreErrorCode::SdsRecordParseError,
            "Store file is not valid UTF-8",
        );
        err.details = Some(format!("byte_offset: {}", source.utf8_error().valid_up_to()));
        err.with_source(source)
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::SdsInvalidConfig, message)
    }

    /// Create a missing metadata error
    pub fn missing_metadata(path: impl fmt::Display) -> Self {
        let mut err = Self::new(
            StoreErrorCode::SdsMissingMetadata,
            "Store file holds no metadata record",
        );
        err.details = Some(format!("path: {}", path));
        err
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Lock contention is the only error a caller can expect to clear by retrying
    pub fn is_retryable(&self) -> bool {
        self.code == StoreErrorCode::SdsLockContended
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        let code = match err {
            LockError::Contended { .. } => StoreErrorCode::SdsLockContended,
            LockError::DirectoryMissing { .. } => StoreErrorCode::SdsLockDirectoryMissing,
            LockError::Io { .. } => StoreErrorCode::SdsLockIoError,
        };
        Self::new(code, err.to_string()).with_source(err)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
