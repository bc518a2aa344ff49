//! Annotation domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every record is identified by a stable `AnnotationId`.
//! - Annotation type is a closed enum; unknown types are unrepresentable.

pub mod annotation;
