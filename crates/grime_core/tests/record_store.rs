use grime_core::{
    AnnotationRecord, AnnotationType, JsonRecordStore, RecordStore, StoreError, WorkspaceContext,
};
use std::path::Path;
use tempfile::TempDir;

fn setup() -> (TempDir, WorkspaceContext, JsonRecordStore) {
    let storage_root = tempfile::tempdir().unwrap();
    let workspace = WorkspaceContext::resolve(Some(Path::new("/work/grime-demo"))).unwrap();
    let store = JsonRecordStore::new(storage_root.path(), &workspace);
    (storage_root, workspace, store)
}

fn backups_of(dir: &Path, file_name: &str) -> Vec<std::path::PathBuf> {
    let prefix = format!("{file_name}.backup-");
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect()
}

#[test]
fn open_creates_workspace_directory_and_empty_type_files() {
    let (storage_root, workspace, _) = setup();
    let (store, repairs) = JsonRecordStore::open(storage_root.path(), &workspace).unwrap();
    assert!(repairs.is_empty());

    let dir = storage_root.path().join(workspace.workspace_hash());
    assert_eq!(store.layout().workspace_dir(), dir.as_path());
    for name in ["todos.json", "fixes.json", "chores.json", "notes.json"] {
        assert_eq!(std::fs::read_to_string(dir.join(name)).unwrap(), "[]");
    }
}

#[test]
fn ensure_calls_are_idempotent_and_keep_existing_content() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    store.ensure_type_files().unwrap();

    let record = AnnotationRecord::new(AnnotationType::Chore, "tidy imports", None, None);
    store
        .save_entries(AnnotationType::Chore, std::slice::from_ref(&record))
        .unwrap();

    store.ensure_workspace_directory().unwrap();
    assert!(store.ensure_type_files().unwrap().is_empty());
    assert_eq!(store.load_entries(AnnotationType::Chore).unwrap(), vec![record]);
}

#[test]
fn save_then_load_round_trips_in_order() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();

    let entries = vec![
        AnnotationRecord::new(
            AnnotationType::Todo,
            "fix login bug",
            Some("src/auth.js".to_string()),
            Some(42),
        ),
        AnnotationRecord::new(AnnotationType::Todo, "write docs", None, None),
        AnnotationRecord::new(
            AnnotationType::Todo,
            "profile startup",
            Some("src/main.rs".to_string()),
            None,
        ),
    ];
    store.save_entries(AnnotationType::Todo, &entries).unwrap();
    assert_eq!(store.load_entries(AnnotationType::Todo).unwrap(), entries);

    store.save_entries(AnnotationType::Todo, &[]).unwrap();
    assert!(store.load_entries(AnnotationType::Todo).unwrap().is_empty());
}

#[test]
fn saved_file_is_pretty_printed_with_stable_field_order() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();

    let record = AnnotationRecord::new(AnnotationType::Note, "remember the cache", None, None);
    store
        .save_entries(AnnotationType::Note, std::slice::from_ref(&record))
        .unwrap();

    let raw = std::fs::read_to_string(store.layout().collection_path(AnnotationType::Note)).unwrap();
    let fields = [
        "\"id\"",
        "\"type\"",
        "\"description\"",
        "\"created_at\"",
        "\"file\"",
        "\"line\"",
        "\"from_comment\"",
    ];
    let positions: Vec<usize> = fields.iter().map(|field| raw.find(field).unwrap()).collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(raw.contains("\n    \"id\""));
    assert!(raw.contains("\"type\": \"note\""));
    assert!(raw.contains("\"file\": null"));
    assert!(raw.contains("\"line\": null"));
    assert!(raw.contains("\"from_comment\": false"));
}

#[test]
fn corrupt_file_is_backed_up_and_reset() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    store.ensure_type_files().unwrap();

    let path = store.layout().collection_path(AnnotationType::Fixme);
    std::fs::write(&path, b"{ not json").unwrap();

    let repairs = store.ensure_type_files().unwrap();
    assert_eq!(repairs.len(), 1);
    let notice = &repairs[0];
    assert_eq!(notice.kind, AnnotationType::Fixme);
    assert_eq!(notice.file, path);
    assert!(!notice.detail.is_empty());

    assert_eq!(std::fs::read(&notice.backup).unwrap(), b"{ not json");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    assert_eq!(
        backups_of(store.layout().workspace_dir(), "fixes.json"),
        vec![notice.backup.clone()]
    );
}

#[test]
fn wrong_shape_counts_as_corrupt() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    let path = store.layout().collection_path(AnnotationType::Todo);
    std::fs::write(&path, br#"{"todos": []}"#).unwrap();

    let notice = store.validate_and_fix(AnnotationType::Todo).unwrap().unwrap();
    assert_eq!(std::fs::read(notice.backup).unwrap(), br#"{"todos": []}"#);
    assert!(store.validate_and_fix(AnnotationType::Todo).unwrap().is_none());
}

#[test]
fn load_repairs_corruption_and_returns_empty() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    let path = store.layout().collection_path(AnnotationType::Note);
    std::fs::write(&path, b"[{\"id\": 1}").unwrap();

    assert!(store.load_entries(AnnotationType::Note).unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    assert_eq!(backups_of(store.layout().workspace_dir(), "notes.json").len(), 1);
}

#[test]
fn missing_file_loads_as_empty() {
    let (_root, _workspace, store) = setup();
    assert!(store.load_entries(AnnotationType::Chore).unwrap().is_empty());
}

#[test]
fn legacy_records_load_with_defaults() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    let path = store.layout().collection_path(AnnotationType::Todo);
    std::fs::write(
        &path,
        r#"[
  {
    "id": "8d0f5c52-3c5e-4d90-9a0e-6c1f0c7a1b11",
    "type": "todo",
    "description": "fix login bug",
    "created_at": "2025-03-01T10:15:30.123Z",
    "file": "src/auth.js",
    "line": 42,
    "from_comment": false
  },
  {
    "id": "1b6e8f0e-51a4-45a8-9d0b-3f2a9c0d7e22",
    "type": "todo",
    "description": "older entry",
    "created_at": "2025-02-01T00:00:00.000Z"
  }
]"#,
    )
    .unwrap();

    let entries = store.load_entries(AnnotationType::Todo).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].file.as_deref(), Some("src/auth.js"));
    assert_eq!(entries[0].line, Some(42));
    assert_eq!(entries[1].file, None);
    assert_eq!(entries[1].line, None);
    assert!(!entries[1].from_comment);
}

#[test]
fn save_rejects_records_from_another_collection() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    store.ensure_type_files().unwrap();

    let record = AnnotationRecord::new(AnnotationType::Fixme, "null deref", None, None);
    let err = store
        .save_entries(AnnotationType::Todo, std::slice::from_ref(&record))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::KindMismatch {
            expected: AnnotationType::Todo,
            found: AnnotationType::Fixme,
            ..
        }
    ));
    assert_eq!(
        std::fs::read_to_string(store.layout().collection_path(AnnotationType::Todo)).unwrap(),
        "[]"
    );
}

#[test]
fn save_rejects_invalid_records() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();

    let mut record = AnnotationRecord::new(AnnotationType::Note, "x", None, None);
    record.description = "  ".to_string();
    let err = store.save_entries(AnnotationType::Note, &[record]).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn workspaces_are_isolated_by_hash() {
    let storage_root = tempfile::tempdir().unwrap();
    let first = WorkspaceContext::resolve(Some(Path::new("/work/one"))).unwrap();
    let second = WorkspaceContext::resolve(Some(Path::new("/work/two"))).unwrap();
    let (store_one, _) = JsonRecordStore::open(storage_root.path(), &first).unwrap();
    let (store_two, _) = JsonRecordStore::open(storage_root.path(), &second).unwrap();

    let record = AnnotationRecord::new(AnnotationType::Todo, "only in one", None, None);
    store_one
        .save_entries(AnnotationType::Todo, std::slice::from_ref(&record))
        .unwrap();

    assert_eq!(store_one.load_entries(AnnotationType::Todo).unwrap().len(), 1);
    assert!(store_two.load_entries(AnnotationType::Todo).unwrap().is_empty());
}

#[test]
fn load_aligns_type_and_orphan_line_with_the_collection() {
    let (_root, _workspace, store) = setup();
    store.ensure_workspace_directory().unwrap();
    let path = store.layout().collection_path(AnnotationType::Todo);
    std::fs::write(
        &path,
        r#"[
  {
    "id": "5f1c2b8e-7d6a-4c1e-9b3f-2a4d6e8f0a33",
    "type": "note",
    "description": "filed in the wrong place",
    "created_at": "2025-01-05T08:00:00.000Z",
    "file": null,
    "line": 5,
    "from_comment": false
  }
]"#,
    )
    .unwrap();

    let entries = store.load_entries(AnnotationType::Todo).unwrap();
    assert_eq!(entries[0].kind, AnnotationType::Todo);
    assert_eq!(entries[0].line, None);

    store.save_entries(AnnotationType::Todo, &entries).unwrap();
    assert_eq!(store.load_entries(AnnotationType::Todo).unwrap(), entries);
}
