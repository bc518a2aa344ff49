//! Record store contracts and JSON-file implementation.
//!
//! # Responsibility
//! - Provide full-collection load/save over one JSON array file per type.
//! - Bootstrap missing collections and self-heal corrupt ones.
//!
//! # Invariants
//! - Write paths validate every record and its collection membership.
//! - Corrupt content is backed up, never deleted, before being reset.
//! - Collections keep insertion order; no sorting happens here.

use crate::model::annotation::{AnnotationRecord, AnnotationType};
use crate::storage::{backup_corrupt_file, write_atomic, StorageLayout, StoreError, StoreResult};
use crate::workspace::WorkspaceContext;
use log::{info, warn};
use std::path::{Path, PathBuf};

const EMPTY_COLLECTION: &[u8] = b"[]";

/// Outcome of one corrupt-collection repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairNotice {
    pub kind: AnnotationType,
    /// Collection path that was reset to `[]`.
    pub file: PathBuf,
    /// Where the original bytes were moved.
    pub backup: PathBuf,
    /// Parse error that triggered the repair.
    pub detail: String,
}

/// Repository interface over per-type annotation collections.
pub trait RecordStore {
    /// Creates the per-workspace directory tree when absent.
    fn ensure_workspace_directory(&self) -> StoreResult<()>;

    /// Creates missing collection files and repairs corrupt ones.
    fn ensure_type_files(&self) -> StoreResult<Vec<RepairNotice>>;

    /// Validates one collection file, repairing it when unparsable.
    fn validate_and_fix(&self, kind: AnnotationType) -> StoreResult<Option<RepairNotice>>;

    /// Loads the full ordered collection for `kind`.
    fn load_entries(&self, kind: AnnotationType) -> StoreResult<Vec<AnnotationRecord>>;

    /// Replaces the full collection for `kind`.
    fn save_entries(&self, kind: AnnotationType, entries: &[AnnotationRecord]) -> StoreResult<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn ensure_workspace_directory(&self) -> StoreResult<()> {
        (**self).ensure_workspace_directory()
    }

    fn ensure_type_files(&self) -> StoreResult<Vec<RepairNotice>> {
        (**self).ensure_type_files()
    }

    fn validate_and_fix(&self, kind: AnnotationType) -> StoreResult<Option<RepairNotice>> {
        (**self).validate_and_fix(kind)
    }

    fn load_entries(&self, kind: AnnotationType) -> StoreResult<Vec<AnnotationRecord>> {
        (**self).load_entries(kind)
    }

    fn save_entries(&self, kind: AnnotationType, entries: &[AnnotationRecord]) -> StoreResult<()> {
        (**self).save_entries(kind, entries)
    }
}

/// JSON-array-file backed record store.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    layout: StorageLayout,
}

impl JsonRecordStore {
    pub fn new(global_storage_root: impl AsRef<Path>, workspace: &WorkspaceContext) -> Self {
        Self {
            layout: StorageLayout::new(global_storage_root, workspace),
        }
    }

    /// Creates the store and runs directory/file bootstrap.
    ///
    /// Returns the repairs performed so callers can surface them.
    pub fn open(
        global_storage_root: impl AsRef<Path>,
        workspace: &WorkspaceContext,
    ) -> StoreResult<(Self, Vec<RepairNotice>)> {
        let store = Self::new(global_storage_root, workspace);
        store.ensure_workspace_directory()?;
        let repairs = store.ensure_type_files()?;
        info!(
            "event=store_open module=repo status=ok workspace_hash={} repairs={}",
            workspace.workspace_hash(),
            repairs.len()
        );
        Ok((store, repairs))
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn read_collection(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io("read", path, err)),
        }
    }

    fn repair(
        &self,
        kind: AnnotationType,
        path: &Path,
        detail: String,
    ) -> StoreResult<RepairNotice> {
        let backup = backup_corrupt_file(path)?;
        write_atomic(path, EMPTY_COLLECTION)?;
        warn!(
            "event=collection_repair module=repo status=recovered type={} file={} backup={} error={}",
            kind,
            path.display(),
            backup.display(),
            detail
        );
        Ok(RepairNotice {
            kind,
            file: path.to_path_buf(),
            backup,
            detail,
        })
    }
}

impl RecordStore for JsonRecordStore {
    fn ensure_workspace_directory(&self) -> StoreResult<()> {
        let dir = self.layout.workspace_dir();
        std::fs::create_dir_all(dir).map_err(|err| StoreError::io("create directory", dir, err))
    }

    fn ensure_type_files(&self) -> StoreResult<Vec<RepairNotice>> {
        let mut repairs = Vec::new();
        for kind in AnnotationType::ALL {
            let path = self.layout.collection_path(kind);
            if path.exists() {
                if let Some(notice) = self.validate_and_fix(kind)? {
                    repairs.push(notice);
                }
            } else {
                write_atomic(&path, EMPTY_COLLECTION)?;
                info!(
                    "event=collection_create module=repo status=ok type={}",
                    kind
                );
            }
        }
        Ok(repairs)
    }

    fn validate_and_fix(&self, kind: AnnotationType) -> StoreResult<Option<RepairNotice>> {
        let path = self.layout.collection_path(kind);
        let Some(bytes) = self.read_collection(&path)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<Vec<AnnotationRecord>>(&bytes) {
            Ok(_) => Ok(None),
            Err(err) => self.repair(kind, &path, err.to_string()).map(Some),
        }
    }

    fn load_entries(&self, kind: AnnotationType) -> StoreResult<Vec<AnnotationRecord>> {
        let path = self.layout.collection_path(kind);
        let Some(bytes) = self.read_collection(&path)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice::<Vec<AnnotationRecord>>(&bytes) {
            Ok(entries) => Ok(normalize_loaded(kind, entries)),
            Err(err) => {
                self.repair(kind, &path, err.to_string())?;
                Ok(Vec::new())
            }
        }
    }

    fn save_entries(&self, kind: AnnotationType, entries: &[AnnotationRecord]) -> StoreResult<()> {
        for entry in entries {
            entry.validate()?;
            if entry.kind != kind {
                return Err(StoreError::KindMismatch {
                    id: entry.id,
                    expected: kind,
                    found: entry.kind,
                });
            }
        }

        let path = self.layout.collection_path(kind);
        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Serialize {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)
    }
}

/// Aligns loaded records with collection invariants.
///
/// The collection a record is stored in decides its type, and a line is
/// dropped when no file is attached (older files could hold such records).
fn normalize_loaded(kind: AnnotationType, mut entries: Vec<AnnotationRecord>) -> Vec<AnnotationRecord> {
    let mut adjusted = 0usize;
    for entry in &mut entries {
        let mut touched = false;
        if entry.kind != kind {
            entry.kind = kind;
            touched = true;
        }
        if entry.line.is_some() && (entry.file.is_none() || entry.line == Some(0)) {
            entry.line = None;
            touched = true;
        }
        if touched {
            adjusted += 1;
        }
    }
    if adjusted > 0 {
        warn!(
            "event=collection_normalize module=repo status=adjusted type={} records={}",
            kind, adjusted
        );
    }
    entries
}
