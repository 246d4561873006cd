//! Full-file load of a store
//!
//! The whole file is read and split on the record separator; element 0
//! is the metadata record, the rest are decoded in file order. In strict
//! mode any undecodable record aborts the load. In lenient mode the bad
//! record is logged and skipped so one corrupt record does not hide the
//! rest of the collection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::freshness::FreshnessToken;
use super::record::{self, Document};
use crate::observability::{log_event_with_fields, Event};

/// Decoded content of a store file
#[derive(Debug, Clone)]
pub struct LoadedStore {
    /// Metadata record, kept opaque
    pub metadata: Value,
    /// Documents in file order
    pub documents: Vec<Document>,
    /// Stamp of the file taken with the read
    pub token: FreshnessToken,
    /// Number of records skipped in lenient mode
    pub skipped: usize,
}

/// Reads and decodes the store file at `path`.
///
/// The freshness token is taken from the open handle before the content
/// is read. A write landing between the two leaves the token older than
/// the content, which only costs an extra reload later.
pub fn load(path: &Path, skip_corrupt: bool) -> StoreResult<LoadedStore> {
    let mut file = File::open(path).map_err(|e| {
        StoreError::io_error(format!("Failed to open store file: {}", path.display()), e)
    })?;

    let token = file
        .metadata()
        .and_then(|m| FreshnessToken::from_metadata(&m))
        .map_err(|e| StoreError::io_error("Failed to read store file metadata", e))?;

    let mut bytes = Vec::with_capacity(token.size() as usize);
    file.read_to_end(&mut bytes).map_err(|e| {
        StoreError::io_error(format!("Failed to read store file: {}", path.display()), e)
    })?;
    let content = String::from_utf8(bytes).map_err(StoreError::invalid_utf8)?;

    let split = record::split_records(&content)
        .ok_or_else(|| StoreError::missing_metadata(path.display()))?;

    let metadata = record::decode(split.metadata).map_err(|e| StoreError::parse_error(0, e))?;

    let mut documents = Vec::with_capacity(split.documents.len());
    let mut skipped = 0;

    for (i, raw) in split.documents.iter().enumerate() {
        // Record index in the file; 0 is the metadata record
        let index = i + 1;
        match record::decode(raw) {
            Ok(document) => documents.push(document),
            Err(e) if skip_corrupt => {
                skipped += 1;
                log_event_with_fields(
                    Event::CorruptRecordSkipped,
                    &[
                        ("path", path.display().to_string().as_str()),
                        ("reason", e.to_string().as_str()),
                        ("record_index", index.to_string().as_str()),
                    ],
                );
            }
            Err(e) => return Err(StoreError::parse_error(index, e)),
        }
    }

    Ok(LoadedStore {
        metadata,
        documents,
        token,
        skipped,
    })
}
