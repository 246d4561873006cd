//! Cross-Instance Staleness Tests
//!
//! Two `Store` values on one file share nothing but the file. A store
//! must notice a newer file and reload before answering.
//!
//! Modification times are pushed forward explicitly so the tests do not
//! depend on the filesystem's timestamp granularity.

use sdstore::{Query, Store};
use serde_json::json;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_store() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("shared.sds");
    (temp_dir, path)
}

/// Sets the file's mtime `secs` seconds into the future.
fn advance_mtime(path: &Path, secs: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

// =============================================================================
// Reload On Foreign Writes
// =============================================================================

/// A document appended by one store is seen by another after its load.
#[test]
fn test_second_instance_sees_append() {
    let (_tmp, path) = create_temp_store();
    let mut a = Store::open(&path).unwrap();
    let mut b = Store::open(&path).unwrap();

    assert!(a.documents().unwrap().is_empty());

    b.append(json!({"from": "b"})).unwrap();
    advance_mtime(&path, 10);

    assert!(a.is_stale());
    assert_eq!(a.find(&Query::equals("from", "b")).unwrap().len(), 1);
    assert!(!a.is_stale());
}

/// A save by one store replaces what another store sees.
#[test]
fn test_second_instance_sees_save() {
    let (_tmp, path) = create_temp_store();
    let mut a = Store::open(&path).unwrap();
    let mut b = Store::open(&path).unwrap();
    a.append(json!({"n": 1})).unwrap();

    b.documents().unwrap();
    for doc in b.get_mut(&Query::equals("n", 1)).unwrap() {
        doc["n"] = json!(100);
    }
    b.save().unwrap();
    advance_mtime(&path, 10);

    assert!(a.find(&Query::equals("n", 1)).unwrap().is_empty());
    assert_eq!(a.find(&Query::equals("n", 100)).unwrap().len(), 1);
}

/// Unsaved in-memory additions are discarded when the file changes.
#[test]
fn test_reload_discards_unsaved_additions() {
    let (_tmp, path) = create_temp_store();
    let mut a = Store::open(&path).unwrap();
    let mut b = Store::open(&path).unwrap();

    a.add(json!({"draft": true})).unwrap();
    b.append(json!({"committed": true})).unwrap();
    advance_mtime(&path, 10);

    let documents = a.documents().unwrap();
    assert_eq!(documents, &[json!({"committed": true})]);
}

/// Append under a stale cache lands after what is already on disk.
#[test]
fn test_append_reloads_before_writing() {
    let (_tmp, path) = create_temp_store();
    let mut a = Store::open(&path).unwrap();
    let mut b = Store::open(&path).unwrap();

    a.documents().unwrap();
    b.append(json!({"seq": 1})).unwrap();
    advance_mtime(&path, 10);

    a.append(json!({"seq": 2})).unwrap();
    let seqs: Vec<_> = a.documents().unwrap().iter().map(|d| d["seq"].clone()).collect();
    assert_eq!(seqs, vec![json!(1), json!(2)]);

    let mut fresh = Store::open(&path).unwrap();
    assert_eq!(fresh.documents().unwrap().len(), 2);
}

// =============================================================================
// Own Writes
// =============================================================================

/// A store's own writes do not make it stale.
#[test]
fn test_own_writes_keep_cache_fresh() {
    let (_tmp, path) = create_temp_store();
    let mut store = Store::open(&path).unwrap();

    store.append(json!({"n": 1})).unwrap();
    assert!(!store.is_stale());

    store.add(json!({"n": 2})).unwrap();
    store.save().unwrap();
    assert!(!store.is_stale());
    assert_eq!(store.documents().unwrap().len(), 2);
}

/// A file that was never loaded counts as stale.
#[test]
fn test_unloaded_store_is_stale() {
    let (_tmp, path) = create_temp_store();
    let store = Store::open(&path).unwrap();
    assert!(store.is_stale());
    assert!(store.freshness().is_none());
}
