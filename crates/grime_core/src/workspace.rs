//! Workspace identity and path helpers.
//!
//! # Responsibility
//! - Derive a stable storage-partition key from the workspace root path.
//! - Carry the resolved root explicitly into store and service constructors.
//!
//! # Invariants
//! - The same normalized path always maps to the same 16-hex-char hash.
//! - A missing workspace is a precondition failure; no storage work follows.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

const WORKSPACE_HASH_LEN: usize = 16;

/// Workspace resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("no workspace detected")]
    NoWorkspace,
    #[error("workspace root must be an absolute path, got `{0}`")]
    NotAbsolute(PathBuf),
}

/// Resolved workspace identity passed to every store/service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceContext {
    root: PathBuf,
    workspace_hash: String,
}

impl WorkspaceContext {
    /// Resolves the context for an optional workspace root.
    ///
    /// # Errors
    /// - `NoWorkspace` when `root` is `None`.
    /// - `NotAbsolute` when `root` is relative.
    pub fn resolve(root: Option<&Path>) -> Result<Self, WorkspaceError> {
        let root = root.ok_or(WorkspaceError::NoWorkspace)?;
        if !root.is_absolute() {
            return Err(WorkspaceError::NotAbsolute(root.to_path_buf()));
        }
        let normalized = normalize_path(root);
        let workspace_hash = hash_normalized(&normalized);
        Ok(Self {
            root: normalized,
            workspace_hash,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workspace_hash(&self) -> &str {
        &self.workspace_hash
    }

    /// Converts an absolute path inside the workspace to the relative form
    /// stored on records. Returns `None` for paths outside the root.
    pub fn relativize(&self, path: &Path) -> Option<String> {
        let normalized = normalize_path(path);
        let relative = normalized.strip_prefix(&self.root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(relative.to_string_lossy().into_owned())
    }

    /// Joins a stored workspace-relative path onto the root.
    pub fn resolve_file(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// Stable 16-hex-char identifier for a workspace root.
pub fn workspace_hash(path: &Path) -> String {
    hash_normalized(&normalize_path(path))
}

fn hash_normalized(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(WORKSPACE_HASH_LEN);
    digest
}

/// Lexical normalization: drops `.`, folds `..` into preceding components,
/// collapses repeated and trailing separators. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{normalize_path, workspace_hash, WorkspaceContext, WorkspaceError};
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};

    #[test]
    fn hash_is_sixteen_lowercase_hex_chars() {
        let hash = workspace_hash(Path::new("/home/dev/project"));
        assert_eq!(hash.len(), 16);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn hash_is_deterministic_and_normalization_aware() {
        let a = workspace_hash(Path::new("/home/dev/project"));
        let b = workspace_hash(Path::new("/home/dev/project"));
        let c = workspace_hash(Path::new("/home/dev/./other/../project/"));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn distinct_paths_produce_distinct_hashes() {
        let paths = [
            "/home/dev/project",
            "/home/dev/project2",
            "/home/dev/Project",
            "/srv/project",
            "/home/dev",
            "/",
        ];
        let hashes: HashSet<String> = paths
            .iter()
            .map(|path| workspace_hash(Path::new(path)))
            .collect();
        assert_eq!(hashes.len(), paths.len());
    }

    #[test]
    fn normalize_path_does_not_escape_root() {
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("a//b/")), PathBuf::from("a/b"));
    }

    #[test]
    fn resolve_requires_an_absolute_root() {
        assert_eq!(
            WorkspaceContext::resolve(None),
            Err(WorkspaceError::NoWorkspace)
        );
        assert!(matches!(
            WorkspaceContext::resolve(Some(Path::new("relative/dir"))),
            Err(WorkspaceError::NotAbsolute(_))
        ));
    }

    #[test]
    fn relativize_keeps_paths_inside_root_only() {
        let context = WorkspaceContext::resolve(Some(Path::new("/work/app"))).unwrap();
        assert_eq!(
            context.relativize(Path::new("/work/app/src/auth.js")),
            Some(PathBuf::from("src/auth.js").to_string_lossy().into_owned())
        );
        assert_eq!(context.relativize(Path::new("/work/other/x.js")), None);
        assert_eq!(context.relativize(Path::new("/work/app")), None);
        assert_eq!(
            context.resolve_file("src/auth.js"),
            PathBuf::from("/work/app/src/auth.js")
        );
    }
}
