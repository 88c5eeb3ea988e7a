//! Violation types produced by the validator.

use std::fmt;

use serde::Serialize;

use crate::style::Format;

/// Kind of structural or content violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViolationKind {
    RawLineBreak,
    InterTagWhitespace,
    SingleQuoteAttribute,
    MissingStyleClass,
    ExcessiveEmptyParagraph,
    DuplicateIcon,
    MissingSection,
    MissingIcon,
    UnlistedExercise,
    FormatCategoryMismatch,
    MalformedFragment,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How sure a heuristic detection is. Structural checks carry no confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violation found in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Corrected (fixed category) or suggested (flexible category) format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_format: Option<Format>,
}

impl Violation {
    #[must_use]
    pub fn structural(kind: ViolationKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            confidence: None,
            suggested_format: None,
        }
    }

    #[must_use]
    pub fn heuristic(
        kind: ViolationKind,
        confidence: Confidence,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            confidence: Some(confidence),
            suggested_format: None,
        }
    }

    /// Whether the repairer has a rule that resolves this violation.
    ///
    /// Flexible-category format suggestions are left for human review.
    #[must_use]
    pub fn is_auto_fixable(&self) -> bool {
        match self.kind {
            ViolationKind::FormatCategoryMismatch => self.confidence == Some(Confidence::High),
            ViolationKind::MissingSection
            | ViolationKind::MissingIcon
            | ViolationKind::MalformedFragment => false,
            _ => true,
        }
    }

    #[must_use]
    pub fn format_human_readable(&self) -> String {
        match self.confidence {
            Some(c) => format!("[{}] ({c}) {}", self.kind, self.description),
            None => format!("[{}] {}", self.kind, self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flexible_suggestion_is_not_auto_fixable() {
        let mut v = Violation::heuristic(
            ViolationKind::FormatCategoryMismatch,
            Confidence::Medium,
            "looks like an AMRAP",
        );
        assert!(!v.is_auto_fixable());
        v.confidence = Some(Confidence::High);
        assert!(v.is_auto_fixable());
    }

    #[test]
    fn test_structural_violation_serializes_without_confidence() {
        let v = Violation::structural(ViolationKind::RawLineBreak, "2 line breaks");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "RawLineBreak");
        assert!(json.get("confidence").is_none());
    }
}
