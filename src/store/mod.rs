//! Document store for sdstore
//!
//! - `Store`: one file, one in-memory collection, reload on staleness
//! - `SharedStore`: the same behind a mutex for use across threads
//!
//! A store owns its collection exclusively. Two `Store` values on the same
//! file coordinate only through the file itself: the advisory lock for
//! writes and the freshness token for reads.

mod cache;
mod shared;
#[allow(clippy::module_inception)]
mod store;

pub use cache::DocumentCache;
pub use shared::SharedStore;
pub use store::Store;
