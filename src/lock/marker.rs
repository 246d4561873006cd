//! Lock marker file operations
//!
//! The marker body is a small JSON owner record. It lets `release` tell
//! its own marker apart from one created by another process after a
//! stale break, and gives an operator something to inspect before
//! removing an orphaned lock by hand.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{LockError, LockResult};
use crate::observability::{log_event_with_fields, Event};

/// Suffix of the marker file name: `.<basename>.lck`
const MARKER_SUFFIX: &str = ".lck";

/// Suffix appended to the marker path for the breaker guard file
const BREAK_GUARD_SUFFIX: &str = ".break";

/// Suffix of a marker renamed aside while being broken
const SET_ASIDE_SUFFIX: &str = ".stale";

/// Default pause between two acquisition attempts
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Returns the marker path guarding `store_path`.
pub fn marker_path(store_path: &Path) -> PathBuf {
    let name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let marker_name = format!(".{}{}", name, MARKER_SUFFIX);

    match store_path.parent() {
        Some(dir) => dir.join(marker_name),
        None => PathBuf::from(marker_name),
    }
}

/// Owner record written into the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    /// Unique token of the acquiring handle
    pub owner: Uuid,
    /// Process id of the acquirer
    pub pid: u32,
    /// When the marker was created
    pub acquired_at: DateTime<Utc>,
}

impl LockOwner {
    fn new() -> Self {
        Self {
            owner: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// Acquisition policy.
///
/// The default is a single point-in-time attempt and markers that never
/// expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    /// Extra attempts after the first one fails with contention
    pub retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Markers older than this are considered abandoned and removed
    pub stale_after: Option<Duration>,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            stale_after: None,
        }
    }
}

impl LockPolicy {
    /// Policy retrying `retries` times, `retry_delay` apart.
    pub fn with_retries(retries: u32, retry_delay: Duration) -> Self {
        Self {
            retries,
            retry_delay,
            ..Self::default()
        }
    }

    /// Sets the age after which a marker is treated as abandoned.
    pub fn stale_after(mut self, max_age: Duration) -> Self {
        self.stale_after = Some(max_age);
        self
    }
}

/// A held lock.
///
/// Released explicitly with [`LockHandle::release`] or implicitly on drop.
/// Releasing more than once is a no-op.
#[derive(Debug)]
pub struct LockHandle {
    marker: PathBuf,
    owner: LockOwner,
    released: bool,
}

impl LockHandle {
    /// Path of the marker file backing this lock.
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Owner record written into the marker.
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Returns whether the lock has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Removes the marker.
    ///
    /// An absent marker counts as released. A marker now carrying another
    /// owner's token is left alone: ours was broken as stale and the file
    /// belongs to its new holder.
    pub fn release(&mut self) -> LockResult<()> {
        if self.released {
            return Ok(());
        }

        match read_marker(&self.marker)? {
            MarkerState::Absent => {}
            MarkerState::Owned(current) if current.owner != self.owner.owner => {
                log_event_with_fields(
                    Event::LockReleaseSkipped,
                    &[
                        ("marker", self.marker.display().to_string().as_str()),
                        ("holder", current.owner.to_string().as_str()),
                    ],
                );
            }
            MarkerState::Owned(_) | MarkerState::Unreadable => remove_marker(&self.marker)?,
        }

        self.released = true;
        log_event_with_fields(
            Event::LockReleased,
            &[("marker", self.marker.display().to_string().as_str())],
        );
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log_event_with_fields(Event::LockReleaseFailed, &[("reason", e.to_string().as_str())]);
        }
    }
}

/// Attempts to take the lock for `store_path` once.
pub fn acquire(store_path: &Path) -> LockResult<LockHandle> {
    acquire_with(store_path, &LockPolicy::default())
}

/// Attempts to take the lock for `store_path` following `policy`.
pub fn acquire_with(store_path: &Path, policy: &LockPolicy) -> LockResult<LockHandle> {
    let marker = marker_path(store_path);

    for attempt in 0..=policy.retries {
        if attempt > 0 {
            thread::sleep(policy.retry_delay);
        }

        match try_create(&marker) {
            Err(LockError::Contended { .. }) => {
                if break_if_stale(&marker, policy)? {
                    match try_create(&marker) {
                        Err(LockError::Contended { .. }) => {}
                        other => return other,
                    }
                }
            }
            other => return other,
        }
    }

    log_event_with_fields(
        Event::LockContended,
        &[
            ("attempts", (policy.retries + 1).to_string().as_str()),
            ("marker", marker.display().to_string().as_str()),
        ],
    );
    Err(LockError::Contended { marker })
}

/// Removes the marker for `store_path` whoever owns it.
///
/// Returns whether a marker was present. Meant for manual cleanup of a
/// lock left behind by a crashed process.
pub fn force_release(store_path: &Path) -> LockResult<bool> {
    let marker = marker_path(store_path);
    let existed = fs::symlink_metadata(&marker).is_ok();
    remove_marker(&marker)?;
    if existed {
        log_event_with_fields(
            Event::LockForceReleased,
            &[("marker", marker.display().to_string().as_str())],
        );
    }
    Ok(existed)
}

/// Returns the owner recorded in the marker for `store_path`, if any.
///
/// `Ok(None)` covers both "not locked" and "marker body unreadable".
pub fn holder(store_path: &Path) -> LockResult<Option<LockOwner>> {
    match read_marker(&marker_path(store_path))? {
        MarkerState::Owned(owner) => Ok(Some(owner)),
        MarkerState::Absent | MarkerState::Unreadable => Ok(None),
    }
}

enum MarkerState {
    Absent,
    Owned(LockOwner),
    Unreadable,
}

fn try_create(marker: &Path) -> LockResult<LockHandle> {
    let dir = marker
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    match OpenOptions::new().write(true).create_new(true).open(marker) {
        Ok(mut file) => {
            let owner = LockOwner::new();
            let written = serde_json::to_vec(&owner)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
                .and_then(|body| file.write_all(&body));

            if let Err(source) = written {
                let _ = fs::remove_file(marker);
                return Err(LockError::Io {
                    marker: marker.to_path_buf(),
                    source,
                });
            }

            log_event_with_fields(
                Event::LockAcquired,
                &[
                    ("marker", marker.display().to_string().as_str()),
                    ("owner", owner.owner.to_string().as_str()),
                ],
            );
            Ok(LockHandle {
                marker: marker.to_path_buf(),
                owner,
                released: false,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LockError::Contended {
            marker: marker.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !dir.is_dir() => {
            Err(LockError::DirectoryMissing {
                dir: dir.to_path_buf(),
            })
        }
        Err(source) => Err(LockError::Io {
            marker: marker.to_path_buf(),
            source,
        }),
    }
}

/// Removes `marker` if the policy deems it abandoned. Returns whether the
/// caller should try to create it again.
///
/// Breakers are serialized by an OS lock on the guard file. The marker
/// judged stale is renamed to a unique sibling and compared with what was
/// judged; a marker that changed in between is put back.
fn break_if_stale(marker: &Path, policy: &LockPolicy) -> LockResult<bool> {
    let Some(max_age) = policy.stale_after else {
        return Ok(false);
    };

    let Some(_guard) = lock_break_guard(marker)? else {
        return Ok(false);
    };

    let judged = match MarkerSnapshot::take(marker)? {
        Some(snapshot) => snapshot,
        None => return Ok(true),
    };

    let age = judged.age();
    if age <= max_age {
        return Ok(false);
    }

    if !set_aside(marker, &judged)? {
        return Ok(false);
    }

    log_event_with_fields(
        Event::StaleLockBroken,
        &[
            ("age_ms", age.as_millis().to_string().as_str()),
            ("marker", marker.display().to_string().as_str()),
        ],
    );
    Ok(true)
}

/// Modification time and raw body of a marker, as seen by a breaker.
///
/// The raw body stands for the owner token and also covers markers whose
/// body never parsed.
#[derive(Debug, PartialEq, Eq)]
struct MarkerSnapshot {
    modified: SystemTime,
    body: Vec<u8>,
}

impl MarkerSnapshot {
    fn take(path: &Path) -> LockResult<Option<Self>> {
        let read = fs::symlink_metadata(path)
            .and_then(|m| m.modified())
            .and_then(|modified| fs::read(path).map(|body| Self { modified, body }));

        match read {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LockError::Io {
                marker: path.to_path_buf(),
                source,
            }),
        }
    }

    fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified)
            .unwrap_or(Duration::ZERO)
    }
}

/// Path of the file whose OS lock serializes stale breakers:
/// `.<basename>.lck.break`
fn break_guard_path(marker: &Path) -> PathBuf {
    let mut name = marker.as_os_str().to_owned();
    name.push(BREAK_GUARD_SUFFIX);
    PathBuf::from(name)
}

/// Takes the breaker guard without waiting. `None` means another breaker
/// holds it. The guard file is never removed; the OS lock on it dies with
/// its holder.
fn lock_break_guard(marker: &Path) -> LockResult<Option<File>> {
    let path = break_guard_path(marker);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| LockError::Io {
            marker: path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
        Err(source) => Err(LockError::Io {
            marker: path,
            source,
        }),
    }
}

/// Moves `marker` out of the way if it still is the one `judged`.
///
/// Returns `true` once the judged marker is gone. A marker that changed
/// since it was judged is a live lock: it is linked back into place,
/// unless the path has been taken again meanwhile, and `false` is
/// returned.
fn set_aside(marker: &Path, judged: &MarkerSnapshot) -> LockResult<bool> {
    let aside = {
        let mut name = marker.as_os_str().to_owned();
        name.push(format!(".{}{}", Uuid::new_v4(), SET_ASIDE_SUFFIX));
        PathBuf::from(name)
    };

    match fs::rename(marker, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(source) => {
            return Err(LockError::Io {
                marker: marker.to_path_buf(),
                source,
            })
        }
    }

    if MarkerSnapshot::take(&aside)?.as_ref() == Some(judged) {
        remove_marker(&aside)?;
        return Ok(true);
    }

    match fs::hard_link(&aside, marker) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(source) => {
            return Err(LockError::Io {
                marker: marker.to_path_buf(),
                source,
            })
        }
    }
    remove_marker(&aside)?;

    log_event_with_fields(
        Event::StaleLockRestored,
        &[("marker", marker.display().to_string().as_str())],
    );
    Ok(false)
}

fn read_marker(marker: &Path) -> LockResult<MarkerState> {
    match fs::read_to_string(marker) {
        Ok(content) => Ok(serde_json::from_str(&content)
            .map(MarkerState::Owned)
            .unwrap_or(MarkerState::Unreadable)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(MarkerState::Absent),
        Err(source) => Err(LockError::Io {
            marker: marker.to_path_buf(),
            source,
        }),
    }
}

fn remove_marker(marker: &Path) -> LockResult<()> {
    match fs::remove_file(marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            marker: marker.to_path_buf(),
            source,
        }),
    }
}
