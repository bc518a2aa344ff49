//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the collection-level data access contract.
//! - Isolate JSON file details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `AnnotationRecord::validate()` before
//!   persistence.
//! - Read paths repair corrupt collections instead of failing the caller.

pub mod record_store;
