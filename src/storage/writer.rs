//! Store file writes
//!
//! Three write paths exist:
//! - creation of a new file holding only the metadata record
//! - append of one separator-prefixed record to the end of the file
//! - full rewrite, through a temp file renamed over the store file
//!
//! A rewrite is all-or-nothing: readers see either the old file or the
//! new one. It replaces the symlink target rather than the link, and
//! keeps the permissions of the file it replaces. An append that fails midway can leave a partial record at
//! the end of the file; every record before it stays valid.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::record;

/// Creates the store file with only the metadata record.
///
/// Returns `Ok(false)` without touching anything if the file already
/// exists.
pub fn create_if_absent(path: &Path, version: &str, sync: bool) -> StoreResult<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(StoreError::write_failed(
                format!("Failed to create store file: {}", path.display()),
                e,
            ))
        }
    };

    let metadata = record::encode(&record::metadata_record(version))
        .map_err(StoreError::encode_failed)?;

    file.write_all(metadata.as_bytes()).map_err(|e| {
        StoreError::write_failed(
            format!("Failed to write metadata record: {}", path.display()),
            e,
        )
    })?;

    if sync {
        file.sync_all()
            .map_err(|e| StoreError::write_failed("fsync failed after creating store file", e))?;
    }

    Ok(true)
}

/// Appends one framed record to the end of an existing store file.
///
/// `framed` must come from [`record::frame_append`]. The file is never
/// created here: appending to a missing file is an error.
pub fn append_record(path: &Path, framed: &str, sync: bool) -> StoreResult<()> {
    let mut file = OpenOptions::new().append(true).open(path).map_err(|e| {
        StoreError::write_failed(
            format!("Failed to open store file for append: {}", path.display()),
            e,
        )
    })?;

    file.write_all(framed.as_bytes()).map_err(|e| {
        StoreError::write_failed(format!("Failed to append record: {}", path.display()), e)
    })?;

    if sync {
        file.sync_all()
            .map_err(|e| StoreError::write_failed("fsync failed after appending record", e))?;
    }

    Ok(())
}

/// Rewrites the whole store file from `metadata` and `documents`.
///
/// A symlinked store path is resolved first so the link survives and its
/// target is replaced. The new file takes over the permissions of the one
/// it replaces. A dangling link is replaced by a regular file.
pub fn rewrite(path: &Path, metadata: &Value, documents: &[Value], sync: bool) -> StoreResult<()> {
    let content = record::frame(metadata, documents).map_err(StoreError::encode_failed)?;
    let target = resolve_target(path)?;
    let temp_path = temp_path(&target);

    let permissions = match fs::metadata(&target) {
        Ok(m) => Some(m.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(StoreError::write_failed(
                format!("Failed to read store file permissions: {}", target.display()),
                e,
            ))
        }
    };

    if let Err(e) = write_temp(&temp_path, content.as_bytes(), permissions, sync) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::write_failed(
            format!("Failed to write temp file: {}", temp_path.display()),
            e,
        ));
    }

    if let Err(e) = fs::rename(&temp_path, &target) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::write_failed(
            format!("Failed to replace store file: {}", target.display()),
            e,
        ));
    }

    if sync {
        // Make the rename itself durable
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }

    Ok(())
}

/// The file a rewrite replaces: `path` with symlinks resolved, or `path`
/// itself when it does not resolve.
fn resolve_target(path: &Path) -> StoreResult<PathBuf> {
    match fs::canonicalize(path) {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(StoreError::write_failed(
            format!("Failed to resolve store path: {}", path.display()),
            e,
        )),
    }
}

/// Temp file used by `rewrite`: `.<basename>.tmp` next to the store file.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_temp(
    temp_path: &Path,
    content: &[u8],
    permissions: Option<Permissions>,
    sync: bool,
) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)?;
    file.write_all(content)?;
    if let Some(permissions) = permissions {
        file.set_permissions(permissions)?;
    }
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::RECORD_SEPARATOR;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_metadata_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");

        assert!(create_if_absent(&path, "0.1", true).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"id":0,"version":"0.1"}"#
        );
    }

    #[test]
    fn test_create_leaves_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        fs::write(&path, "existing").unwrap();

        assert!(!create_if_absent(&path, "0.1", true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing");
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope").join("db.sds");

        let err = create_if_absent(&path, "0.1", false).unwrap_err();
        assert_eq!(err.code().code(), "SDS_STORE_WRITE_FAILED");
    }

    #[test]
    fn test_append_adds_prefixed_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        create_if_absent(&path, "0.1", false).unwrap();

        let framed = record::frame_append(&json!({"n": 1})).unwrap();
        append_record(&path, &framed, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!(r#"{{"id":0,"version":"0.1"}}{}{{"n":1}}"#, RECORD_SEPARATOR)
        );
    }

    #[test]
    fn test_append_to_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let framed = record::frame_append(&json!({"n": 1})).unwrap();

        let err = append_record(&tmp.path().join("absent.sds"), &framed, false).unwrap_err();
        assert_eq!(err.code().code(), "SDS_STORE_WRITE_FAILED");
        assert!(!tmp.path().join("absent.sds").exists());
    }

    #[test]
    fn test_rewrite_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        create_if_absent(&path, "0.1", false).unwrap();
        append_record(&path, &record::frame_append(&json!({"old": true})).unwrap(), false)
            .unwrap();

        let docs = vec![json!({"n": 1}), json!({"n": 2})];
        rewrite(&path, &record::metadata_record("0.1"), &docs, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("old"));
        assert_eq!(content.matches(RECORD_SEPARATOR).count(), 2);
        assert!(!temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_through_symlink_keeps_link() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real.sds");
        let link = tmp.path().join("db.sds");
        create_if_absent(&real, "0.1", false).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        rewrite(&link, &record::metadata_record("0.1"), &[json!({"n": 1})], true).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(fs::read_to_string(&real).unwrap().contains(r#"{"n":1}"#));
        assert!(!temp_path(&link).exists());
        assert!(!temp_path(&real).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        create_if_absent(&path, "0.1", false).unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();

        rewrite(&path, &record::metadata_record("0.1"), &[json!({"n": 1})], false).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path(Path::new("/data/db.sds")),
            PathBuf::from("/data/.db.sds.tmp")
        );
    }
}
