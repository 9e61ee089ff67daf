//! Realtime change propagation between clients.
//!
//! # Responsibility
//! - Describe annotation changes pushed by the backing store.
//! - Merge those changes into a local per-scope collection.
//!
//! # Invariants
//! - Events for other scopes never touch a collection.
//! - Merging mirrors storage truth; it never re-runs the overlap check.

pub mod events;
