//! sdstore - a simple persistent JSON document store
//!
//! One UTF-8 file holds a metadata record followed by JSON documents,
//! separated by U+241E. A [`Store`] caches the documents in memory,
//! reloads them when another writer changes the file, and serializes
//! its own file writes through an advisory lock marker.

pub mod cli;
pub mod config;
pub mod lock;
pub mod observability;
pub mod query;
pub mod storage;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use query::{Operator, Query};
pub use storage::{Document, StoreError, StoreErrorCode, StoreResult};
pub use store::{SharedStore, Store};
