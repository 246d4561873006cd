//! Store file subsystem for sdstore
//!
//! Owns everything that touches the store file's bytes: the record codec
//! and framing, the freshness stamp, the full-file reader and the three
//! write paths (create, append, rewrite).
//!
//! # File format
//!
//! A UTF-8 file of JSON records separated by U+241E. The first record is
//! the metadata record `{"id":0,"version":"0.1"}`; every following record
//! is one document. A new file holds only the metadata record.

mod errors;
mod freshness;
mod reader;
mod record;
mod writer;

pub use errors::{StoreError, StoreErrorCode, StoreResult};
pub use freshness::{is_stale, stamp, FreshnessToken};
pub use reader::{load, LoadedStore};
pub use record::{
    decode, encode, frame, frame_append, metadata_record, Document, DEFAULT_VERSION,
    RECORD_SEPARATOR,
};
pub use writer::{append_record, create_if_absent, rewrite};
