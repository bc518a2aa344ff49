//! Per-workspace storage layout and file primitives.
//!
//! # Responsibility
//! - Map a global storage root and workspace hash to collection file paths.
//! - Provide atomic full-file writes and corrupt-file backup primitives.
//!
//! # Invariants
//! - Every collection lives at `<root>/<workspace_hash>/<type file>`.
//! - Writes never leave a partially written collection at the target path.
//!
//! # See also
//! - `repo::record_store` for the collection-level contract.

use crate::model::annotation::{AnnotationId, AnnotationType, AnnotationValidationError};
use crate::workspace::WorkspaceContext;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod fs;

pub use fs::{backup_corrupt_file, backup_path_for, write_atomic};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failures surfaced to the service layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} `{}`: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize `{}`: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] AnnotationValidationError),
    #[error("record {id} has type `{found}` but was saved into the `{expected}` collection")]
    KindMismatch {
        id: AnnotationId,
        expected: AnnotationType,
        found: AnnotationType,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resolved on-disk layout for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    workspace_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(global_storage_root: impl AsRef<Path>, workspace: &WorkspaceContext) -> Self {
        Self {
            workspace_dir: global_storage_root
                .as_ref()
                .join(workspace.workspace_hash()),
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn collection_path(&self, kind: AnnotationType) -> PathBuf {
        self.workspace_dir.join(kind.file_name())
    }
}
