//! File primitives for collection storage.
//!
//! # Invariants
//! - `write_atomic` publishes content via temp file + rename in the same
//!   directory, so readers see either the old or the new bytes.
//! - `backup_corrupt_file` moves bytes aside; it never deletes them.

use super::{StoreError, StoreResult};
use chrono::Utc;
use log::{error, info};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Replaces `path` with `bytes` atomically from a reader's perspective.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let started_at = Instant::now();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let result = (|| -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|err| StoreError::io("create temp file in", dir, err))?;
        tmp.write_all(bytes)
            .map_err(|err| StoreError::io("write temp file for", path, err))?;
        tmp.as_file()
            .sync_all()
            .map_err(|err| StoreError::io("fsync temp file for", path, err))?;
        tmp.persist(path)
            .map_err(|err| StoreError::io("replace", path, err.error))?;
        Ok(())
    })();

    match &result {
        Ok(()) => info!(
            "event=collection_write module=storage status=ok bytes={} duration_ms={}",
            bytes.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=collection_write module=storage status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Backup path `<file_name>.backup-<epoch_millis>` next to `path`.
pub fn backup_path_for(path: &Path, epoch_millis: i64) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".backup-{epoch_millis}"));
    path.with_file_name(name)
}

/// Moves a corrupt file to a fresh timestamped backup path and returns it.
pub fn backup_corrupt_file(path: &Path) -> StoreResult<PathBuf> {
    let mut millis = Utc::now().timestamp_millis();
    let mut backup = backup_path_for(path, millis);
    // Same-millisecond repairs must not overwrite an earlier backup.
    while backup.exists() {
        millis += 1;
        backup = backup_path_for(path, millis);
    }
    std::fs::rename(path, &backup).map_err(|err| StoreError::io("back up", path, err))?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::{backup_corrupt_file, backup_path_for, write_atomic};
    use std::path::Path;

    #[test]
    fn backup_path_appends_suffix_to_file_name() {
        let backup = backup_path_for(Path::new("/data/abc/todos.json"), 1_700_000_000_123);
        assert_eq!(
            backup,
            Path::new("/data/abc/todos.json.backup-1700000000123")
        );
    }

    #[test]
    fn write_atomic_replaces_content_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.json");
        write_atomic(&target, b"[]").unwrap();
        write_atomic(&target, b"[1]").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"[1]");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn repeated_backups_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chores.json");

        std::fs::write(&target, b"first").unwrap();
        let first = backup_corrupt_file(&target).unwrap();
        std::fs::write(&target, b"second").unwrap();
        let second = backup_corrupt_file(&target).unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(first).unwrap(), b"first");
        assert_eq!(std::fs::read(second).unwrap(), b"second");
        assert!(!target.exists());
    }
}
