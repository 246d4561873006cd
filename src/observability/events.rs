//! Observable store events
//!
//! Events are explicit and typed; each maps to one log event name and a
//! fixed severity.

use std::fmt;

use super::logger::Severity;

/// Observable events of a store and its lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Store file created with only the metadata record
    StoreCreated,
    /// Store bound to an existing file
    StoreOpened,
    /// Configuration loaded from a file
    ConfigLoaded,

    // Cache
    /// Cache found stale, reload required
    CacheStale,
    /// A record could not be decoded and was skipped (lenient mode)
    CorruptRecordSkipped,

    // Writes
    /// Single document durably appended
    AppendComplete,
    /// Append failed, in-memory push rolled back
    AppendFailed,
    /// Save replaced a file changed by another writer since the last load
    SaveOverwroteExternal,
    /// Freshness stamp could not be refreshed after a successful write
    RestampFailed,

    // Lock
    /// Lock marker created
    LockAcquired,
    /// Lock marker already present after every attempt
    LockContended,
    /// Lock marker removed
    LockReleased,
    /// Release found a marker owned by someone else and left it
    LockReleaseSkipped,
    /// Release failed while dropping a handle
    LockReleaseFailed,
    /// Abandoned marker removed by the stale-lock policy
    StaleLockBroken,
    /// Marker set aside for breaking turned out to be live and was put back
    StaleLockRestored,
    /// Marker removed by manual cleanup
    LockForceReleased,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreCreated => "STORE_CREATED",
            Event::StoreOpened => "STORE_OPENED",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::CacheStale => "CACHE_STALE",
            Event::CorruptRecordSkipped => "CORRUPT_RECORD_SKIPPED",

            Event::AppendComplete => "APPEND_COMPLETE",
            Event::AppendFailed => "APPEND_FAILED",
            Event::SaveOverwroteExternal => "SAVE_OVERWROTE_EXTERNAL",
            Event::RestampFailed => "RESTAMP_FAILED",

            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::LockContended => "LOCK_CONTENDED",
            Event::LockReleased => "LOCK_RELEASED",
            Event::LockReleaseSkipped => "LOCK_RELEASE_SKIPPED",
            Event::LockReleaseFailed => "LOCK_RELEASE_FAILED",
            Event::StaleLockBroken => "STALE_LOCK_BROKEN",
            Event::StaleLockRestored => "STALE_LOCK_RESTORED",
            Event::LockForceReleased => "LOCK_FORCE_RELEASED",
        }
    }

    /// Returns the severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CacheStale | Event::LockAcquired | Event::LockReleased => Severity::Trace,
            Event::CorruptRecordSkipped
            | Event::LockContended
            | Event::LockReleaseSkipped
            | Event::StaleLockBroken
            | Event::StaleLockRestored
            | Event::LockForceReleased
            | Event::SaveOverwroteExternal
            | Event::RestampFailed => Severity::Warn,
            Event::AppendFailed | Event::LockReleaseFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::StoreCreated,
            Event::StoreOpened,
            Event::ConfigLoaded,
            Event::CacheStale,
            Event::CorruptRecordSkipped,
            Event::AppendComplete,
            Event::AppendFailed,
            Event::SaveOverwroteExternal,
            Event::RestampFailed,
            Event::LockAcquired,
            Event::LockContended,
            Event::LockReleased,
            Event::LockReleaseSkipped,
            Event::LockReleaseFailed,
            Event::StaleLockBroken,
            Event::StaleLockRestored,
            Event::LockForceReleased,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::AppendFailed.severity(), Severity::Error);
        assert_eq!(Event::StaleLockBroken.severity(), Severity::Warn);
        assert_eq!(Event::StoreCreated.severity(), Severity::Info);
        assert_eq!(Event::LockAcquired.severity(), Severity::Trace);
    }
}
