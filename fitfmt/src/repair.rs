//! Repairer: deterministic rewrite of a record into canonical form.
//!
//! Steps run in a fixed order and each is idempotent on its own; the last step
//! re-applies the full normalizer so the output is always a normalizer fixed
//! point. Running [`Repairer::repair`] on its own output reports no change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::fixers::{IconFixer, ListFixer};
use crate::normalize::{self, Normalizer, Pass};
use crate::record::ContentRecord;
use crate::rules::FormatRules;
use crate::style::{Format, StyleGuide};
use crate::violation::Confidence;

/// What a repair changed, step by step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairStats {
    pub icons_fixed: usize,
    pub spacing_fixed: usize,
    pub lists_normalized: usize,
    pub quotes_fixed: usize,
    /// Bold spelling / nesting canonicalizations.
    pub markers_fixed: usize,
    /// Fixed-category format corrections (0 or 1).
    pub formats_fixed: usize,
    /// Low-confidence notes for steps that were skipped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl RepairStats {
    /// Accumulate counters of another record (notes are kept per record).
    pub fn add(&mut self, other: &RepairStats) {
        self.icons_fixed += other.icons_fixed;
        self.spacing_fixed += other.spacing_fixed;
        self.lists_normalized += other.lists_normalized;
        self.quotes_fixed += other.quotes_fixed;
        self.markers_fixed += other.markers_fixed;
        self.formats_fixed += other.formats_fixed;
    }
}

/// Result of repairing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    /// `true` iff the fragment differs byte for byte from the input.
    pub repaired: bool,
    /// The new fragment; `None` when nothing changed and nothing must be written.
    pub new_fragment: Option<String>,
    /// Corrected format for a fixed-rule category; `None` when already allowed.
    pub new_format: Option<Format>,
    pub stats: RepairStats,
}

impl RepairOutcome {
    /// Whether anything has to be persisted.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        self.new_fragment.is_some() || self.new_format.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Repairer {
    guide: Arc<StyleGuide>,
    normalizer: Normalizer,
    icons: IconFixer,
    lists: ListFixer,
    rules: FormatRules,
}

impl Repairer {
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>) -> Self {
        Self {
            normalizer: Normalizer::new(Arc::clone(&guide)),
            icons: IconFixer::new(&guide),
            lists: ListFixer::new(Arc::clone(&guide)),
            rules: FormatRules::new(Arc::clone(&guide)),
            guide,
        }
    }

    #[must_use]
    pub fn guide(&self) -> &Arc<StyleGuide> {
        &self.guide
    }

    /// Repair one record. Never fails: a step that cannot parse the fragment is
    /// skipped and noted in [`RepairStats::notes`].
    #[must_use]
    pub fn repair(&self, record: &ContentRecord) -> RepairOutcome {
        let mut stats = RepairStats::default();
        let fragment = self.repair_fragment(&record.id, &record.body, &mut stats);

        let decision = self
            .rules
            .required_format(record.category, record.format, &record.body);
        let new_format = (decision.changed && decision.confidence == Confidence::High)
            .then_some(decision.required);
        if new_format.is_some() {
            stats.formats_fixed = 1;
        }

        let repaired = fragment != record.body;
        debug!(
            record = %record.id,
            repaired,
            format_fixed = new_format.is_some(),
            "repaired record"
        );
        RepairOutcome {
            repaired,
            new_fragment: repaired.then_some(fragment),
            new_format,
            stats,
        }
    }

    fn repair_fragment(&self, id: &str, body: &str, stats: &mut RepairStats) -> String {
        let n = &self.normalizer;

        let mut text = apply(body, normalize::double_quote_attributes, &mut stats.quotes_fixed);
        // Before any spacing pass: collapsing whitespace can hide icon adjacency.
        text = apply(&text, |s| self.icons.fix(s), &mut stats.icons_fixed);

        text = apply(&text, normalize::strip_line_breaks, &mut stats.spacing_fixed);
        text = apply(&text, normalize::collapse_intertag_whitespace, &mut stats.spacing_fixed);
        text = apply(&text, normalize::canonicalize_bold, &mut stats.markers_fixed);
        text = apply(&text, normalize::merge_split_lists, &mut stats.lists_normalized);
        text = apply(&text, |s| n.canonicalize_blank_paragraphs(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| n.drop_blank_after_headers(s), &mut stats.spacing_fixed);

        text = apply(&text, |s| n.trim_blank_edges(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| n.collapse_blank_runs(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| n.drop_blank_between_items(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| self.lists.drop_blank_after_lists(s), &mut stats.spacing_fixed);

        match self.lists.listize_exercises(&text) {
            Ok(pass) => {
                stats.lists_normalized += pass.count;
                text = pass.text;
            }
            Err(err) => {
                warn!(record = %id, error = %err, "skipping list normalization");
                stats
                    .notes
                    .push(format!("list normalization skipped (low confidence): {err}"));
            }
        }
        text = apply(&text, normalize::merge_split_lists, &mut stats.lists_normalized);
        // Lists created above need the same blank-line tidy-up as existing ones.
        text = apply(&text, |s| n.drop_blank_between_items(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| self.lists.drop_blank_after_lists(s), &mut stats.spacing_fixed);
        text = apply(&text, |s| n.inject_style_classes(s), &mut stats.lists_normalized);

        n.normalize(&text)
    }
}

fn apply(text: &str, pass: impl Fn(&str) -> Pass, counter: &mut usize) -> String {
    let Pass { text, count } = pass(text);
    *counter += count;
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Category;

    const P: &str = "<p class=\"tiptap-paragraph\">";
    const E: &str = "<p class=\"tiptap-paragraph\"></p>";

    fn repairer() -> Repairer {
        Repairer::new(Arc::new(StyleGuide::standard()))
    }

    fn record(body: &str) -> ContentRecord {
        ContentRecord::new("w-1", Category::Cardio, Format::Circuit, body)
    }

    #[test]
    fn test_quote_fix() {
        let outcome = repairer().repair(&record("<p class='x'>A</p>"));
        assert!(outcome.repaired);
        let text = outcome.new_fragment.unwrap();
        assert!(text.contains("class=\"x\""), "{text}");
        assert_eq!(outcome.stats.quotes_fixed, 1);
    }

    #[test]
    fn test_duplicate_icon_collapse() {
        let body = format!("\u{1F525} {P}<strong><u>\u{1F525} Activation</u></strong></p>");
        let outcome = repairer().repair(&record(&body));
        let text = outcome.new_fragment.unwrap();
        assert_eq!(text.matches('\u{1F525}').count(), 1);
        assert!(outcome.stats.icons_fixed >= 1);
    }

    #[test]
    fn test_duplicate_icon_collapse_for_other_header_shapes() {
        let r = repairer();
        for body in [
            "\u{1F525} <p><u><strong>\u{1F525} Activation</strong></u></p>",
            "\u{1F525} <p><strong style=\"x\"><u>\u{1F525} Activation</u></strong></p>",
        ] {
            let first = r.repair(&record(body));
            assert!(first.stats.icons_fixed >= 1, "{body}");
            let text = first.new_fragment.unwrap();
            assert_eq!(text.matches('\u{1F525}').count(), 1, "{text}");
            assert!(!r.repair(&record(&text)).repaired, "{text}");
        }
    }

    #[test]
    fn test_blank_after_new_list_is_dropped_in_one_pass() {
        let r = repairer();
        let body = "<p>Squats 10 reps</p><p></p><p>Keep your back straight throughout.</p>";
        let text = r.repair(&record(body)).new_fragment.unwrap();
        assert!(!text.contains(&format!("</ul>{E}")), "{text}");
        assert!(text.ends_with(&format!("</ul>{P}Keep your back straight throughout.</p>")), "{text}");
        assert!(!r.repair(&record(&text)).repaired);
    }

    #[test]
    fn test_spacing_collapse() {
        let body = format!("{P}Intro to the session.</p>{E}{E}{E}{P}Finish strong today.</p>");
        let outcome = repairer().repair(&record(&body));
        let text = outcome.new_fragment.unwrap();
        assert_eq!(text.matches(E).count(), 1);
        assert!(outcome.stats.spacing_fixed >= 1);
    }

    #[test]
    fn test_listization() {
        let body = format!("{P}Squats 3 x 12</p>{P}Push-ups 10 reps</p>{P}Plank 30 sec</p>");
        let outcome = repairer().repair(&record(&body));
        let text = outcome.new_fragment.unwrap();
        assert_eq!(text.matches("<ul").count(), 1);
        assert_eq!(text.matches("<li").count(), 3);
        assert!(outcome.stats.lists_normalized >= 1);
    }

    #[test]
    fn test_exercises_after_a_list_join_it() {
        let body = format!(
            "<ul class=\"tiptap-bullet-list\"><li class=\"tiptap-list-item\">{P}Squats 10 reps</p></li></ul>{E}{P}Lunges 10 reps</p>"
        );
        let text = repairer().repair(&record(&body)).new_fragment.unwrap();
        assert_eq!(text.matches("<ul").count(), 1);
        assert_eq!(text.matches("<li").count(), 2);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let r = repairer();
        let bodies = [
            format!("<p class='x'>A</p>\n{E}{E}<p>Squats 10 reps</p>\n<p>Lunges 12 reps</p>"),
            format!("\u{1F525} {P}<strong><u>\u{1F525} Activation</u></strong></p>{E}<p>Jumping jacks 30s</p>"),
            format!("<u><b>\u{1F4AA} Main Workout</b></u><ul><li>a</li></ul><ul><li>b</li></ul>{E}"),
            format!("{P}Squats 10 reps"),
            "<p>Squats 10 reps</p><p></p><p>Keep your back straight throughout.</p>".to_owned(),
            "\u{1F525} <p><u><strong>\u{1F525} Activation</strong></u></p>".to_owned(),
            "\u{1F525} <p><strong style=\"x\"><u>\u{1F525} Activation</u></strong></p>".to_owned(),
            String::new(),
        ];
        for body in bodies {
            let first = r.repair(&record(&body));
            let once = first.new_fragment.unwrap_or(body.clone());
            let second = r.repair(&record(&once));
            assert!(!second.repaired, "second repair changed {once:?} into {:?}", second.new_fragment);
            assert!(second.new_fragment.is_none());
        }
    }

    #[test]
    fn test_clean_record_is_not_repaired() {
        let body = format!("{P}<strong><u>\u{1F525} Activation</u></strong></p>{P}Warm up gently.</p>");
        let outcome = repairer().repair(&record(&body));
        assert!(!outcome.repaired);
        assert!(outcome.new_fragment.is_none());
        assert_eq!(outcome.stats, RepairStats::default());
    }

    #[test]
    fn test_malformed_fragment_skips_listization_only() {
        let outcome = repairer().repair(&record("<p class='x'>Squats 10 reps"));
        let text = outcome.new_fragment.unwrap();
        assert!(text.contains("class=\"x\""));
        assert!(!text.contains("<ul"));
        assert_eq!(outcome.stats.notes.len(), 1);
        assert!(outcome.stats.notes[0].contains("low confidence"));
    }

    #[test]
    fn test_fixed_category_format_is_corrected() {
        let rec = ContentRecord::new("w-2", Category::Strength, Format::Tabata, format!("{P}ok</p>"));
        let outcome = repairer().repair(&rec);
        assert!(!outcome.repaired);
        assert_eq!(outcome.new_format, Some(Format::RepsAndSets));
        assert!(outcome.needs_write());
        assert_eq!(outcome.stats.formats_fixed, 1);
    }

    #[test]
    fn test_flexible_suggestion_is_not_applied() {
        let body = format!("{P}AMRAP 12 min</p>{P}As many rounds as possible.</p>{P}amrap</p>");
        let outcome = repairer().repair(&record(&body));
        assert!(outcome.new_format.is_none());
    }
}
