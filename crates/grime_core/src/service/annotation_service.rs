//! Annotation use-case service.
//!
//! # Responsibility
//! - Enforce duplicate detection, edit validity and type migration.
//! - Orchestrate full-collection reload/modify/save cycles on the store.
//! - Publish an invalidation event after every successful mutation.
//!
//! # Invariants
//! - No state is cached between calls; every operation reloads.
//! - Rejected operations (duplicate, not found, invalid input) write nothing
//!   and publish nothing.
//! - Migration writes the destination before the source and restores the
//!   destination when the source write fails, so a record is never dropped
//!   from both collections.

use crate::model::annotation::{
    normalize_description, AnnotationId, AnnotationRecord, AnnotationType,
    AnnotationValidationError, DuplicateKey,
};
use crate::repo::record_store::RecordStore;
use crate::service::notifier::{ChangeEvent, ChangeKind, ChangeNotifier};
use crate::storage::{StoreError, StoreResult};
use crate::workspace::WorkspaceContext;
use log::{error, info};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from annotation service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A record with the same normalized triple already exists.
    #[error("duplicate {kind} annotation detected; entry not saved")]
    Duplicate { kind: AnnotationType },
    /// Target record is no longer in the expected collection.
    #[error("{kind} annotation not found: {id}")]
    NotFound {
        kind: AnnotationType,
        id: AnnotationId,
    },
    #[error(transparent)]
    Validation(#[from] AnnotationValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Source write failed after the destination was written, and restoring
    /// the destination failed too. The record exists in both collections.
    #[error(
        "moving {id} from {from} to {to} failed ({write_error}) and the rollback failed ({rollback_error})"
    )]
    MigrationRollbackFailed {
        id: AnnotationId,
        from: AnnotationType,
        to: AnnotationType,
        #[source]
        write_error: StoreError,
        rollback_error: StoreError,
    },
}

/// Source of the file the user is currently focused on.
///
/// Implementations return the workspace-relative path, or `None` when no
/// file in the workspace is active.
pub trait ActiveFileContext {
    fn active_file(&self) -> Option<String>;
}

/// Context with no active file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActiveFile;

impl ActiveFileContext for NoActiveFile {
    fn active_file(&self) -> Option<String> {
        None
    }
}

impl ActiveFileContext for Option<String> {
    fn active_file(&self) -> Option<String> {
        self.clone()
    }
}

/// Complete, pre-collected input for one create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAnnotation {
    pub kind: AnnotationType,
    pub description: String,
    /// Attach the active file when one is resolvable.
    pub attach_active_file: bool,
    /// 1-based line; ignored when no file ends up attached.
    pub line: Option<u32>,
}

/// Editor location for an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 0-based line index.
    pub line_index: u32,
}

/// Outcome of resolving an annotation's file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Record is not tied to a file.
    NotAssociated,
    /// Stored file no longer exists. Callers may offer `delete_stale`.
    Stale { path: PathBuf },
    Open(Location),
}

/// Annotation engine facade over a record store.
pub struct AnnotationService<R: RecordStore> {
    store: R,
    workspace: WorkspaceContext,
    notifier: ChangeNotifier,
}

impl<R: RecordStore> AnnotationService<R> {
    pub fn new(store: R, workspace: WorkspaceContext, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            workspace,
            notifier,
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn workspace(&self) -> &WorkspaceContext {
        &self.workspace
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Lists one collection in store order.
    pub fn list(&self, kind: AnnotationType) -> StoreResult<Vec<AnnotationRecord>> {
        self.store.load_entries(kind)
    }

    /// Finds a record by id across all collections.
    pub fn find(&self, id: AnnotationId) -> StoreResult<Option<AnnotationRecord>> {
        for kind in AnnotationType::ALL {
            if let Some(record) = self
                .store
                .load_entries(kind)?
                .into_iter()
                .find(|entry| entry.id == id)
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Creates and persists one annotation.
    ///
    /// # Errors
    /// - `Validation` when the description is blank or the line is 0.
    /// - `Duplicate` when the normalized triple already exists in the
    ///   target collection.
    pub fn create(
        &self,
        request: &CreateAnnotation,
        context: &dyn ActiveFileContext,
    ) -> Result<AnnotationRecord, ServiceError> {
        let description = normalize_description(&request.description)?;
        let file = if request.attach_active_file {
            context.active_file()
        } else {
            None
        };
        let record = AnnotationRecord::new(request.kind, description, file, request.line);
        record.validate()?;

        let mut entries = self.store.load_entries(request.kind)?;
        let key = record.duplicate_key();
        if entries.iter().any(|entry| entry.duplicate_key() == key) {
            info!(
                "event=annotation_create module=service status=rejected reason=duplicate type={}",
                request.kind
            );
            return Err(ServiceError::Duplicate { kind: request.kind });
        }

        entries.push(record.clone());
        self.store.save_entries(request.kind, &entries)?;
        info!(
            "event=annotation_create module=service status=ok type={} id={} has_file={} count={}",
            record.kind,
            record.id,
            record.file.is_some(),
            entries.len()
        );
        self.publish(ChangeKind::Created, vec![record.kind]);
        Ok(record)
    }

    /// Updates description and optionally migrates to another type.
    ///
    /// `id`, `created_at`, `file` and `line` are always preserved.
    ///
    /// # Errors
    /// - `Validation` when `new_description` is blank.
    /// - `NotFound` when the record is missing from its current collection.
    /// - `Duplicate` when the edited record collides with another record in
    ///   the target collection.
    pub fn edit(
        &self,
        record: &AnnotationRecord,
        new_type: AnnotationType,
        new_description: &str,
    ) -> Result<AnnotationRecord, ServiceError> {
        let description = normalize_description(new_description)?;
        if new_type == record.kind {
            self.edit_in_place(record, description)
        } else {
            self.migrate(record, new_type, description)
        }
    }

    fn edit_in_place(
        &self,
        record: &AnnotationRecord,
        description: String,
    ) -> Result<AnnotationRecord, ServiceError> {
        let kind = record.kind;
        let mut entries = self.store.load_entries(kind)?;
        let position = self.position_of(&entries, kind, record.id)?;

        let target = &entries[position];
        let key = DuplicateKey::new(&description, target.file.as_deref(), target.line);
        ensure_unique(&entries, record.id, &key, kind)?;

        entries[position].description = description;
        let updated = entries[position].clone();
        self.store.save_entries(kind, &entries)?;
        info!(
            "event=annotation_edit module=service status=ok type={} id={}",
            kind, record.id
        );
        self.publish(ChangeKind::Updated, vec![kind]);
        Ok(updated)
    }

    fn migrate(
        &self,
        record: &AnnotationRecord,
        new_type: AnnotationType,
        description: String,
    ) -> Result<AnnotationRecord, ServiceError> {
        let old_type = record.kind;
        let mut source = self.store.load_entries(old_type)?;
        let position = self.position_of(&source, old_type, record.id)?;

        let mut moved = source[position].clone();
        moved.kind = new_type;
        moved.description = description;

        let destination_before = self.store.load_entries(new_type)?;
        ensure_unique(&destination_before, moved.id, &moved.duplicate_key(), new_type)?;

        let mut destination = destination_before.clone();
        destination.push(moved.clone());
        self.store.save_entries(new_type, &destination)?;

        source.remove(position);
        if let Err(write_error) = self.store.save_entries(old_type, &source) {
            return Err(self.roll_back_migration(
                &moved,
                old_type,
                &destination_before,
                write_error,
            ));
        }

        info!(
            "event=annotation_migrate module=service status=ok from={} to={} id={}",
            old_type, new_type, moved.id
        );
        self.publish(ChangeKind::Migrated, vec![old_type, new_type]);
        Ok(moved)
    }

    fn roll_back_migration(
        &self,
        moved: &AnnotationRecord,
        old_type: AnnotationType,
        destination_before: &[AnnotationRecord],
        write_error: StoreError,
    ) -> ServiceError {
        match self.store.save_entries(moved.kind, destination_before) {
            Ok(()) => {
                error!(
                    "event=annotation_migrate module=service status=rolled_back from={} to={} id={} error={}",
                    old_type, moved.kind, moved.id, write_error
                );
                ServiceError::Store(write_error)
            }
            Err(rollback_error) => {
                error!(
                    "event=annotation_migrate module=service status=error from={} to={} id={} error={} rollback_error={}",
                    old_type, moved.kind, moved.id, write_error, rollback_error
                );
                ServiceError::MigrationRollbackFailed {
                    id: moved.id,
                    from: old_type,
                    to: moved.kind,
                    write_error,
                    rollback_error,
                }
            }
        }
    }

    /// Deletes one record by id.
    ///
    /// # Errors
    /// - `NotFound` when no record with `id` exists in `kind`; the collection
    ///   is left untouched.
    pub fn delete(&self, kind: AnnotationType, id: AnnotationId) -> Result<(), ServiceError> {
        let entries = self.store.load_entries(kind)?;
        let before = entries.len();
        let remaining: Vec<AnnotationRecord> =
            entries.into_iter().filter(|entry| entry.id != id).collect();

        if remaining.len() == before {
            info!(
                "event=annotation_delete module=service status=rejected reason=not_found type={} id={}",
                kind, id
            );
            return Err(ServiceError::NotFound { kind, id });
        }

        self.store.save_entries(kind, &remaining)?;
        info!(
            "event=annotation_delete module=service status=ok type={} id={} count={}",
            kind,
            id,
            remaining.len()
        );
        self.publish(ChangeKind::Deleted, vec![kind]);
        Ok(())
    }

    /// Resolves where the editor should open for `record`.
    ///
    /// Never deletes; a stale result only reports the missing path.
    pub fn navigate(&self, record: &AnnotationRecord) -> Navigation {
        let Some(relative) = record.file.as_deref() else {
            return Navigation::NotAssociated;
        };

        let path = self.workspace.resolve_file(relative);
        if !path.exists() {
            info!(
                "event=annotation_navigate module=service status=stale type={} id={}",
                record.kind, record.id
            );
            return Navigation::Stale { path };
        }

        let line_index = record.line.map_or(0, |line| line.saturating_sub(1));
        Navigation::Open(Location { path, line_index })
    }

    /// Deletes a record after the caller confirmed a stale navigation.
    pub fn delete_stale(&self, record: &AnnotationRecord) -> Result<(), ServiceError> {
        self.delete(record.kind, record.id)
    }

    fn position_of(
        &self,
        entries: &[AnnotationRecord],
        kind: AnnotationType,
        id: AnnotationId,
    ) -> Result<usize, ServiceError> {
        entries.iter().position(|entry| entry.id == id).ok_or_else(|| {
            info!(
                "event=annotation_edit module=service status=rejected reason=not_found type={} id={}",
                kind, id
            );
            ServiceError::NotFound { kind, id }
        })
    }

    fn publish(&self, kind: ChangeKind, types: Vec<AnnotationType>) {
        self.notifier.notify(&ChangeEvent { kind, types });
    }
}

fn ensure_unique(
    entries: &[AnnotationRecord],
    own_id: AnnotationId,
    key: &DuplicateKey,
    kind: AnnotationType,
) -> Result<(), ServiceError> {
    let collides = entries
        .iter()
        .any(|entry| entry.id != own_id && entry.duplicate_key() == *key);
    if collides {
        info!(
            "event=annotation_edit module=service status=rejected reason=duplicate type={}",
            kind
        );
        return Err(ServiceError::Duplicate { kind });
    }
    Ok(())
}
