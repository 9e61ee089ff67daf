//! Content source contracts.
//!
//! # Responsibility
//! - Define how the engine obtains the canonical text of a scope.
//! - Apply the content-kind transform before the engine sees any text.
//!
//! # Invariants
//! - Canonical text of a scope is stable while its annotations are shown.
//! - The engine only ever sees formatted text; offsets are measured on it.

pub mod format;

use crate::model::annotation::Scope;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use format::{format_content, ContentKind};

/// Content lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// The source has no content for the scope.
    ScopeNotFound(Scope),
    /// The source failed for another reason.
    Unavailable(String),
}

impl Display for ContentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScopeNotFound(scope) => write!(f, "no content for scope `{scope}`"),
            Self::Unavailable(message) => write!(f, "content unavailable: {message}"),
        }
    }
}

impl Error for ContentError {}

/// Supplies raw field content per scope.
pub trait ContentSource {
    /// Returns the raw (unformatted) content of one scope.
    fn get_content(&self, scope: &Scope) -> Result<String, ContentError>;

    /// Returns how the raw content is formatted before display.
    fn content_kind(&self, _scope: &Scope) -> ContentKind {
        ContentKind::PlainText
    }

    /// Returns the canonical text offsets are measured against.
    fn canonical_text(&self, scope: &Scope) -> Result<String, ContentError> {
        let raw = self.get_content(scope)?;
        Ok(format_content(&raw, self.content_kind(scope)))
    }
}

/// In-process content source keyed by scope.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource {
    entries: BTreeMap<Scope, (String, ContentKind)>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the content of one scope.
    pub fn insert(&mut self, scope: Scope, raw: impl Into<String>, kind: ContentKind) {
        self.entries.insert(scope, (raw.into(), kind));
    }
}

impl ContentSource for MemoryContentSource {
    fn get_content(&self, scope: &Scope) -> Result<String, ContentError> {
        self.entries
            .get(scope)
            .map(|(raw, _)| raw.clone())
            .ok_or_else(|| ContentError::ScopeNotFound(scope.clone()))
    }

    fn content_kind(&self, scope: &Scope) -> ContentKind {
        self.entries
            .get(scope)
            .map_or(ContentKind::PlainText, |(_, kind)| *kind)
    }
}
