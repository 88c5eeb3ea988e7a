//! Content records as the engine sees them.

use serde::{Deserialize, Serialize};

use crate::style::{Category, Format};

/// What kind of authored content a record holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Workout,
    Program,
}

/// One record from the content store.
///
/// The engine only reads records and, in repair mode, replaces `body` and
/// `format`. It never creates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    #[serde(default)]
    pub kind: RecordKind,
    pub category: Category,
    pub format: Format,
    /// The fragment: constrained rich-text markup.
    pub body: String,
}

impl ContentRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        category: Category,
        format: Format,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RecordKind::Workout,
            category,
            format,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }
}
