//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence contract for annotation records.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate drafts before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Overlap`) in
//!   addition to DB transport errors.

pub mod annotation_repo;
