//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into use-case level APIs.
//! - Keep CLI/presentation layers decoupled from storage details.

pub mod annotation_service;
pub mod notifier;
pub mod tree_service;
