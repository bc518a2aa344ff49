//! Core domain logic for Grime annotations.
//! This crate is the single source of truth for annotation invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod workspace;

pub use config::{ConfigError, ConfigFile, ConfigOverrides, GrimeConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::annotation::{
    AnnotationId, AnnotationRecord, AnnotationType, AnnotationValidationError, DuplicateKey,
    ParseAnnotationTypeError,
};
pub use repo::record_store::{JsonRecordStore, RecordStore, RepairNotice};
pub use service::annotation_service::{
    ActiveFileContext, AnnotationService, CreateAnnotation, Location, Navigation, NoActiveFile,
    ServiceError,
};
pub use service::notifier::{ChangeEvent, ChangeKind, ChangeNotifier, SubscriptionId};
pub use service::tree_service::{AnnotationTree, TreeGroup, TreeNode};
pub use storage::{StorageLayout, StoreError, StoreResult};
pub use workspace::{workspace_hash, WorkspaceContext, WorkspaceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
