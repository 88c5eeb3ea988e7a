//! Error types for the integrity engine.
//!
//! Only [`BatchError`] ever fails a whole page call. Per-record problems are
//! surfaced as data ([`RecordError`]) inside the reports.

use serde::Serialize;
use thiserror::Error;

use crate::style::Category;

/// Failure of the content-store collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// Fetching a page (or a single target record) failed.
    #[error("store read failed: {0}")]
    Read(String),
    /// Persisting a repaired fragment or format failed for one record.
    #[error("store write failed for record {id}: {message}")]
    Write { id: String, message: String },
    /// A targeted record does not exist.
    #[error("record {0} not found")]
    NotFound(String),
}

/// Errors that abort a page call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The page request itself is unusable (zero limit, limit over the cap, ...).
    #[error("invalid page request: {0}")]
    InvalidPage(String),
}

/// A fragment could not be minimally parsed by a fixer step.
///
/// Never escapes the engine: the failing step is skipped and a note is recorded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed fragment at byte {offset}: {reason}")]
pub struct MalformedFragment {
    pub offset: usize,
    pub reason: String,
}

/// A style guide that cannot be used.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StyleGuideError {
    #[error("style guide parse error: {0}")]
    Parse(String),
    #[error("invalid class '{class}' for <{tag}>")]
    InvalidClass { tag: String, class: String },
    #[error("section '{0}' has an empty icon")]
    EmptyIcon(String),
    #[error("icon '{0}' is used by more than one section")]
    DuplicateIcon(String),
    #[error("fixed rule for {0} allows no format")]
    EmptyRule(Category),
    #[error("no flexible formats configured")]
    NoFlexibleFormats,
}

/// A per-record failure captured in a report; processing continued past it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordError {
    pub id: String,
    pub error: String,
}

impl RecordError {
    #[must_use]
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
        }
    }

    /// Format the error for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        format!("{}: [error] {}", self.id, self.error)
    }
}
