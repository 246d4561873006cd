//! Advisory cross-process lock for a store file
//!
//! A lock is held while the marker file `.<basename>.lck` exists next to
//! the store file. The marker is created with an atomic create-if-absent
//! open, so exactly one process can win a race for it.
//!
//! Locks are advisory: a writer that does not go through this module is
//! not excluded. A process that dies while holding the marker leaves it
//! behind. By default such a marker never expires; set
//! [`LockPolicy::stale_after`] or call [`force_release`] to clean up.
//!
//! Breaking a stale marker is serialized by an OS lock on a guard file,
//! `.<basename>.lck.break`, which stays on disk. The stale marker is first
//! renamed to a unique `.<basename>.lck.<uuid>.stale` sibling and only
//! deleted if it is still the marker that was judged stale.

mod errors;
mod marker;

pub use errors::{LockError, LockResult};
pub use marker::{
    acquire, acquire_with, force_release, holder, marker_path, LockHandle, LockOwner, LockPolicy,
};
