//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into annotation use-cases.
//! - Drive the per-scope selection flow on top of the pure engine.
//! - Keep presentation layers decoupled from storage details.

pub mod annotation_service;
pub mod scope_session;
