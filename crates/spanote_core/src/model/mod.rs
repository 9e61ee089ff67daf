//! Interval model for span annotations.
//!
//! # Responsibility
//! - Define the annotation record, its scope and its char-offset span.
//! - Hold the per-scope in-memory collection used by rendering and checks.
//!
//! # Invariants
//! - Offsets are char offsets into the canonical text of one scope.
//! - Annotations of one scope never overlap; touching is allowed.

pub mod annotation;
pub mod annotation_set;
pub mod text;
