//! Audit and repair report types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RecordError;
use crate::repair::RepairStats;
use crate::violation::{Violation, ViolationKind};

/// Violations found in one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordViolations {
    pub id: String,
    pub violations: Vec<Violation>,
}

/// A low-confidence note attached to one record's repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordNote {
    pub id: String,
    pub note: String,
}

/// Result of auditing one page.
///
/// Callers must check `errors` as well as `records`: a record listed in
/// `errors` was not audited at all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct AuditReport {
    /// Records audited (including those that failed).
    pub total_scanned: usize,
    pub compliant: usize,
    pub violating: usize,
    pub violation_counts: BTreeMap<ViolationKind, usize>,
    /// Only records with at least one violation, in page order.
    pub records: Vec<RecordViolations>,
    pub errors: Vec<RecordError>,
    /// Offset of the next page; `None` when this page was the last.
    pub next_offset: Option<usize>,
    pub generated_at: DateTime<Utc>,
}

impl AuditReport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_scanned: 0,
            compliant: 0,
            violating: 0,
            violation_counts: BTreeMap::new(),
            records: Vec::new(),
            errors: Vec::new(),
            next_offset: None,
            generated_at: Utc::now(),
        }
    }

    pub fn add_record(&mut self, id: &str, violations: Vec<Violation>) {
        self.total_scanned += 1;
        if violations.is_empty() {
            self.compliant += 1;
            return;
        }
        self.violating += 1;
        for v in &violations {
            *self.violation_counts.entry(v.kind).or_default() += 1;
        }
        self.records.push(RecordViolations {
            id: id.to_owned(),
            violations,
        });
    }

    pub fn add_error(&mut self, error: RecordError) {
        self.total_scanned += 1;
        self.errors.push(error);
    }

    /// Number of violations found across the page.
    #[must_use]
    pub fn violations_count(&self) -> usize {
        self.violation_counts.values().sum()
    }

    /// Every audited record is compliant and none failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violating == 0 && self.errors.is_empty()
    }
}

impl Default for AuditReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of repairing one page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RepairReport {
    /// Records processed (including those that failed).
    pub total_processed: usize,
    /// Records whose fragment or format was changed (and persisted unless `dry_run`).
    pub repaired_ids: Vec<String>,
    /// Records that needed no change.
    pub skipped_ids: Vec<String>,
    pub errors: Vec<RecordError>,
    /// Fix counters summed over the repaired records.
    pub totals: RepairStats,
    pub notes: Vec<RecordNote>,
    pub dry_run: bool,
    pub next_offset: Option<usize>,
    pub generated_at: DateTime<Utc>,
}

impl RepairReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            total_processed: 0,
            repaired_ids: Vec::new(),
            skipped_ids: Vec::new(),
            errors: Vec::new(),
            totals: RepairStats::default(),
            notes: Vec::new(),
            dry_run,
            next_offset: None,
            generated_at: Utc::now(),
        }
    }

    pub fn add_repaired(&mut self, id: &str, stats: &RepairStats) {
        self.total_processed += 1;
        self.totals.add(stats);
        self.add_notes(id, stats);
        self.repaired_ids.push(id.to_owned());
    }

    pub fn add_skipped(&mut self, id: &str, stats: &RepairStats) {
        self.total_processed += 1;
        self.add_notes(id, stats);
        self.skipped_ids.push(id.to_owned());
    }

    pub fn add_error(&mut self, error: RecordError) {
        self.total_processed += 1;
        self.errors.push(error);
    }

    fn add_notes(&mut self, id: &str, stats: &RepairStats) {
        self.notes.extend(stats.notes.iter().map(|note| RecordNote {
            id: id.to_owned(),
            note: note.clone(),
        }));
    }
}
