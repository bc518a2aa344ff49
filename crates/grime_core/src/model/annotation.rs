//! Annotation domain model.
//!
//! # Responsibility
//! - Define the canonical record persisted in per-type collections.
//! - Define the closed set of annotation types and their storage mapping.
//! - Provide the normalized duplicate key shared by create and edit.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `description` is non-blank after trim.
//! - `line` is 1-based and only present together with `file`.
//!
//! # See also
//! - `repo::record_store` for the on-disk shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier for one annotation record.
pub type AnnotationId = Uuid;

/// Closed set of annotation categories.
///
/// Each variant owns exactly one collection file in the workspace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Todo,
    Fixme,
    Chore,
    Note,
}

impl AnnotationType {
    /// All types in presentation order.
    pub const ALL: [AnnotationType; 4] = [
        AnnotationType::Todo,
        AnnotationType::Fixme,
        AnnotationType::Chore,
        AnnotationType::Note,
    ];

    /// Lowercase wire name (`todo|fixme|chore|note`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Fixme => "fixme",
            Self::Chore => "chore",
            Self::Note => "note",
        }
    }

    /// Collection file name inside the workspace directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Todo => "todos.json",
            Self::Fixme => "fixes.json",
            Self::Chore => "chores.json",
            Self::Note => "notes.json",
        }
    }

    /// Capitalized label used for tree group nodes.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::Fixme => "Fixme",
            Self::Chore => "Chore",
            Self::Note => "Note",
        }
    }
}

impl Display for AnnotationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected annotation type string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid annotation type `{0}`; expected todo|fixme|chore|note")]
pub struct ParseAnnotationTypeError(pub String);

impl FromStr for AnnotationType {
    type Err = ParseAnnotationTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "todo" => Ok(Self::Todo),
            "fixme" => Ok(Self::Fixme),
            "chore" => Ok(Self::Chore),
            "note" => Ok(Self::Note),
            other => Err(ParseAnnotationTypeError(other.to_string())),
        }
    }
}

/// Record-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationValidationError {
    #[error("annotation description must not be blank")]
    BlankDescription,
    #[error("annotation line must be 1-based, got {0}")]
    LineOutOfRange(u32),
    #[error("annotation line {0} requires an associated file")]
    LineWithoutFile(u32),
}

/// Canonical annotation record.
///
/// Field order is the serialized order; keep it stable for diffable files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    /// Serialized as `type` to match the on-disk schema.
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Workspace-relative path, `null` when not tied to a file.
    #[serde(default)]
    pub file: Option<String>,
    /// 1-based line, `null` when unknown.
    #[serde(default)]
    pub line: Option<u32>,
    /// Provenance marker. Always `false` for user-entered records.
    #[serde(default)]
    pub from_comment: bool,
}

impl AnnotationRecord {
    /// Creates a record with a generated id and the current timestamp.
    ///
    /// `line` is dropped when `file` is `None`.
    pub fn new(
        kind: AnnotationType,
        description: impl Into<String>,
        file: Option<String>,
        line: Option<u32>,
    ) -> Self {
        let line = if file.is_some() { line } else { None };
        Self {
            id: Uuid::new_v4(),
            kind,
            description: description.into(),
            created_at: Utc::now(),
            file,
            line,
            from_comment: false,
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), AnnotationValidationError> {
        if self.description.trim().is_empty() {
            return Err(AnnotationValidationError::BlankDescription);
        }
        if let Some(line) = self.line {
            if line == 0 {
                return Err(AnnotationValidationError::LineOutOfRange(line));
            }
            if self.file.is_none() {
                return Err(AnnotationValidationError::LineWithoutFile(line));
            }
        }
        Ok(())
    }

    /// Normalized identity used for duplicate detection.
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey::new(&self.description, self.file.as_deref(), self.line)
    }

    /// `file:line`, `file`, or `None` when no file is attached.
    pub fn location_label(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match self.line {
            Some(line) => format!("{file}:{line}"),
            None => file.to_string(),
        })
    }
}

/// Normalized `(description, file, line)` triple.
///
/// Description comparison is trim + lowercase. Absent file/line compare as
/// the same `None`, never as a literal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    description: String,
    file: Option<String>,
    line: Option<u32>,
}

impl DuplicateKey {
    pub fn new(description: &str, file: Option<&str>, line: Option<u32>) -> Self {
        Self {
            description: description.trim().to_lowercase(),
            file: file.map(str::to_string),
            line,
        }
    }
}

/// Trims a user-supplied description and rejects blank input.
pub fn normalize_description(value: &str) -> Result<String, AnnotationValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AnnotationValidationError::BlankDescription);
    }
    Ok(trimmed.to_string())
}
