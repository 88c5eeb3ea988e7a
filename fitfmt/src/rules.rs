//! Category → format rule engine.
//!
//! Fixed-rule categories are decided structurally (always `High` confidence).
//! Flexible categories only ever get an advisory suggestion from a keyword scan
//! of the body, at `Low` or `Medium` confidence, and are never auto-applied.

use std::sync::Arc;

use serde::Serialize;

use crate::markup::strip_tags;
use crate::style::{Category, Format, StyleGuide};
use crate::violation::Confidence;

/// Keyword hits needed before a flexible-category suggestion is made.
const MIN_SUGGESTION_SCORE: usize = 2;
/// Keyword hits for a `Medium` suggestion (when the declared format has none).
const MEDIUM_SUGGESTION_SCORE: usize = 3;

/// Outcome of [`FormatRules::required_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDecision {
    pub required: Format,
    pub changed: bool,
    pub confidence: Confidence,
}

/// Evidence-based format suggestion for a flexible category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatSuggestion {
    pub format: Format,
    /// Keyword hits for the suggested format.
    pub score: usize,
    /// Keyword hits for the declared format.
    pub declared_score: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone)]
pub struct FormatRules {
    guide: Arc<StyleGuide>,
}

impl FormatRules {
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>) -> Self {
        Self { guide }
    }

    #[must_use]
    pub fn guide(&self) -> &Arc<StyleGuide> {
        &self.guide
    }

    #[must_use]
    pub fn is_allowed(&self, category: Category, format: Format) -> bool {
        self.guide.permitted_formats(category).contains(&format)
    }

    /// The format a record of `category` must (or, for flexible categories, probably should) declare.
    ///
    /// For a fixed-rule category the answer ignores `body`: the current format
    /// stays if allowed, otherwise the first allowed format is required.
    #[must_use]
    pub fn required_format(&self, category: Category, current: Format, body: &str) -> FormatDecision {
        let permitted = self.guide.permitted_formats(category);
        let structural = self.guide.fixed_formats(category).is_some() || !permitted.contains(&current);

        if structural {
            let required = if permitted.contains(&current) {
                current
            } else {
                permitted.first().copied().unwrap_or(current)
            };
            return FormatDecision {
                required,
                changed: required != current,
                confidence: Confidence::High,
            };
        }

        match self.suggest_format(current, body) {
            Some(s) if permitted.contains(&s.format) => FormatDecision {
                required: s.format,
                changed: true,
                confidence: s.confidence,
            },
            _ => FormatDecision {
                required: current,
                changed: false,
                confidence: Confidence::Low,
            },
        }
    }

    /// Keyword scan of `body`; suggests a format only when it clearly beats `declared`.
    #[must_use]
    pub fn suggest_format(&self, declared: Format, body: &str) -> Option<FormatSuggestion> {
        let text = strip_tags(body).to_lowercase();
        let score_of = |format: Format| -> usize {
            self.guide
                .format_keywords
                .get(&format)
                .map_or(0, |words| words.iter().map(|w| text.matches(w.as_str()).count()).sum())
        };

        let declared_score = score_of(declared);
        let (format, score) = self
            .guide
            .format_keywords
            .keys()
            .map(|f| (*f, score_of(*f)))
            .filter(|(f, _)| *f != declared)
            .max_by_key(|(_, score)| *score)?;

        if score < MIN_SUGGESTION_SCORE || score <= declared_score {
            return None;
        }
        let confidence = if score >= MEDIUM_SUGGESTION_SCORE && declared_score == 0 {
            Confidence::Medium
        } else {
            Confidence::Low
        };
        Some(FormatSuggestion {
            format,
            score,
            declared_score,
            confidence,
        })
    }
}
