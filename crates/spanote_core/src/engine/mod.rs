//! Pure annotation engine: overlap checks, rendering, selection mapping.
//!
//! # Responsibility
//! - Decide whether a candidate span may join a scope's collection.
//! - Partition canonical text into renderable segments.
//! - Map rendered selections back to canonical char offsets.
//!
//! # Invariants
//! - Nothing in this module performs I/O or holds state.
//! - The engine is content-type agnostic; JSON is pre-formatted upstream.

pub mod overlap;
pub mod partition;
pub mod selection;
