//! Validator: read-only violation detection.
//!
//! Hygiene checks run the repair passes on a scratch copy and look at their
//! counts, so a violation is reported exactly when the repairer would act on it.
//! Shape checks (sections, unlisted exercises) run on the normalized text, the
//! same shape the repairer's list step sees.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::fixers::IconFixer;
use crate::markup::{self, Block, BlockKind};
use crate::normalize::{self, Normalizer};
use crate::record::{ContentRecord, RecordKind};
use crate::rules::FormatRules;
use crate::style::StyleGuide;
use crate::violation::{Confidence, Violation, ViolationKind};

/// Two or more blank paragraphs in a row, in any spelling.
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"(?:<p(?:\s[^<>]*)?>(?:\s|&nbsp;|<br\s*/?>)*</p>\s*){2,}") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid blank run regex: {err}"),
    }
});

#[derive(Debug, Clone)]
pub struct Validator {
    guide: Arc<StyleGuide>,
    normalizer: Normalizer,
    icons: IconFixer,
    rules: FormatRules,
}

impl Validator {
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>) -> Self {
        Self {
            normalizer: Normalizer::new(Arc::clone(&guide)),
            icons: IconFixer::new(&guide),
            rules: FormatRules::new(Arc::clone(&guide)),
            guide,
        }
    }

    #[must_use]
    pub fn guide(&self) -> &Arc<StyleGuide> {
        &self.guide
    }

    /// All violations of `record`, in the fixed order the checks run.
    ///
    /// The result is not sorted by significance; callers wanting high-confidence
    /// findings first must sort it themselves.
    #[must_use]
    pub fn validate(&self, record: &ContentRecord) -> Vec<Violation> {
        let body = record.body.as_str();
        let mut out = Vec::new();

        self.check_hygiene(body, &mut out);

        let normalized = self.normalizer.normalize(body);
        match markup::blocks(&normalized) {
            Ok(blocks) => {
                if record.kind == RecordKind::Workout {
                    self.check_sections(&blocks, &mut out);
                }
                self.check_exercises(&blocks, &mut out);
            }
            Err(err) => {
                warn!(record = %record.id, error = %err, "skipping shape checks");
                out.push(Violation::heuristic(
                    ViolationKind::MalformedFragment,
                    Confidence::Low,
                    format!("shape checks skipped: {err}"),
                ));
            }
        }

        self.check_format(record, &mut out);

        debug!(record = %record.id, violations = out.len(), "validated record");
        out
    }

    fn check_hygiene(&self, body: &str, out: &mut Vec<Violation>) {
        let breaks = normalize::strip_line_breaks(body).count;
        if breaks > 0 {
            out.push(Violation::structural(
                ViolationKind::RawLineBreak,
                format!("{breaks} raw line break(s)"),
            ));
        }
        let gaps = normalize::collapse_intertag_whitespace(body).count;
        if gaps > 0 {
            out.push(Violation::structural(
                ViolationKind::InterTagWhitespace,
                format!("{gaps} whitespace gap(s) between tags"),
            ));
        }
        let quotes = normalize::double_quote_attributes(body).count;
        if quotes > 0 {
            out.push(Violation::structural(
                ViolationKind::SingleQuoteAttribute,
                format!("{quotes} single-quoted attribute value(s)"),
            ));
        }
        let classes = self.normalizer.inject_style_classes(body).count;
        if classes > 0 {
            out.push(Violation::structural(
                ViolationKind::MissingStyleClass,
                format!("{classes} tag(s) without a style class"),
            ));
        }
        let runs = BLANK_RUN.find_iter(body).count();
        if runs > 0 {
            out.push(Violation::structural(
                ViolationKind::ExcessiveEmptyParagraph,
                format!("{runs} run(s) of consecutive empty paragraphs"),
            ));
        }
        let icons = self.icons.count(body);
        if icons > 0 {
            out.push(Violation::structural(
                ViolationKind::DuplicateIcon,
                format!("{icons} duplicated section icon(s)"),
            ));
        }
    }

    fn check_sections(&self, blocks: &[Block<'_>], out: &mut Vec<Violation>) {
        let mut found = vec![false; self.guide.sections.len()];

        for block in blocks {
            let inner = match block.kind {
                BlockKind::Paragraph | BlockKind::Other => block.inner,
                BlockKind::List => continue,
            };
            let Some((section, has_icon)) = markup::section_header(inner, &self.guide) else {
                continue;
            };
            if let Some(i) = self.guide.sections.iter().position(|s| s.name == section.name) {
                found[i] = true;
            }
            if !has_icon {
                out.push(Violation::structural(
                    ViolationKind::MissingIcon,
                    format!("header \"{}\" is missing its {} icon", section.name, section.icon),
                ));
            }
        }

        for (section, present) in self.guide.sections.iter().zip(found) {
            if section.required && !present {
                out.push(Violation::structural(
                    ViolationKind::MissingSection,
                    format!("required section \"{}\" not found", section.name),
                ));
            }
        }
    }

    fn check_exercises(&self, blocks: &[Block<'_>], out: &mut Vec<Violation>) {
        for run in markup::exercise_runs(blocks, &self.guide) {
            for block in &blocks[run.first..=run.last] {
                let confidence =
                    markup::exercise_line(block.inner, &self.guide).unwrap_or(run.confidence);
                out.push(Violation::heuristic(
                    ViolationKind::UnlistedExercise,
                    confidence,
                    format!("exercise line \"{}\" is not in a list", block.inner.trim()),
                ));
            }
        }
    }

    fn check_format(&self, record: &ContentRecord, out: &mut Vec<Violation>) {
        let decision = self
            .rules
            .required_format(record.category, record.format, &record.body);
        if !decision.changed {
            return;
        }
        let description = if decision.confidence == Confidence::High {
            format!(
                "{} does not allow format {}; expected {}",
                record.category, record.format, decision.required
            )
        } else {
            format!(
                "body reads like {} rather than declared {}",
                decision.required, record.format
            )
        };
        let mut violation = Violation::heuristic(
            ViolationKind::FormatCategoryMismatch,
            decision.confidence,
            description,
        );
        violation.suggested_format = Some(decision.required);
        out.push(violation);
    }
}
