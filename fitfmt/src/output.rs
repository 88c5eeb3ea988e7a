//! Shared output formatting for audit and repair reports.
//!
//! Provides JSON and plain-text formatters. Color/terminal formatting is left to
//! the caller.

use std::io::Write;

use serde::Serialize;

use crate::report::{AuditReport, RepairReport};

const RULE_WIDTH: usize = 80;

/// Format any report as pretty JSON to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized>(report: &T, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

fn banner(writer: &mut dyn Write, title: &str) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(writer, "  {title}")?;
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(writer)?;
    Ok(())
}

fn section(writer: &mut dyn Write, title: &str) -> anyhow::Result<()> {
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
    writeln!(writer, "  {title}")?;
    writeln!(writer, "{}", "-".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Format an [`AuditReport`] as human-readable plain text.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_audit_human(report: &AuditReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    banner(writer, "CONTENT INTEGRITY AUDIT")?;
    writeln!(writer, "  Records scanned:  {}", report.total_scanned)?;
    writeln!(writer, "  Compliant:        {}", report.compliant)?;
    writeln!(writer, "  Violating:        {}", report.violating)?;
    writeln!(writer, "  Errors:           {}", report.errors.len())?;
    writeln!(writer)?;

    if !report.violation_counts.is_empty() {
        section(writer, "VIOLATIONS BY KIND")?;
        for (kind, count) in &report.violation_counts {
            writeln!(writer, "  {:<26} {count}", kind.to_string())?;
        }
        writeln!(writer)?;
    }

    if !report.records.is_empty() {
        section(writer, "RECORDS")?;
        for record in &report.records {
            writeln!(writer, "{}", record.id)?;
            for violation in &record.violations {
                writeln!(writer, "    {}", violation.format_human_readable())?;
            }
        }
        writeln!(writer)?;
    }

    if !report.errors.is_empty() {
        section(writer, "ERRORS (records that could not be audited)")?;
        for error in &report.errors {
            writeln!(writer, "{}", error.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    if report.is_clean() {
        writeln!(writer, "\u{2713} All {} records are compliant", report.total_scanned)?;
    } else {
        writeln!(
            writer,
            "\u{2717} {} violation(s) in {} record(s), {} error(s)",
            report.violations_count(),
            report.violating,
            report.errors.len()
        )?;
    }
    if let Some(next) = report.next_offset {
        writeln!(writer, "  Next page offset: {next}")?;
    }
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Format a [`RepairReport`] as human-readable plain text.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_repair_human(report: &RepairReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    let title = if report.dry_run {
        "CONTENT INTEGRITY REPAIR (dry run)"
    } else {
        "CONTENT INTEGRITY REPAIR"
    };
    banner(writer, title)?;
    writeln!(writer, "  Records processed: {}", report.total_processed)?;
    writeln!(writer, "  Repaired:          {}", report.repaired_ids.len())?;
    writeln!(writer, "  Unchanged:         {}", report.skipped_ids.len())?;
    writeln!(writer, "  Errors:            {}", report.errors.len())?;
    writeln!(writer)?;

    let t = &report.totals;
    section(writer, "FIXES")?;
    for (label, count) in [
        ("quotes", t.quotes_fixed),
        ("icons", t.icons_fixed),
        ("spacing", t.spacing_fixed),
        ("lists", t.lists_normalized),
        ("bold markers", t.markers_fixed),
        ("formats", t.formats_fixed),
    ] {
        writeln!(writer, "  {label:<14} {count}")?;
    }
    writeln!(writer)?;

    if !report.repaired_ids.is_empty() {
        section(writer, "REPAIRED")?;
        for id in &report.repaired_ids {
            writeln!(writer, "  {id}")?;
        }
        writeln!(writer)?;
    }

    if !report.notes.is_empty() {
        section(writer, "NOTES")?;
        for note in &report.notes {
            writeln!(writer, "{}: {}", note.id, note.note)?;
        }
        writeln!(writer)?;
    }

    if !report.errors.is_empty() {
        section(writer, "ERRORS (re-run the page to retry)")?;
        for error in &report.errors {
            writeln!(writer, "{}", error.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    if report.errors.is_empty() {
        writeln!(writer, "\u{2713} {} record(s) repaired", report.repaired_ids.len())?;
    } else {
        writeln!(
            writer,
            "\u{2717} {} record(s) repaired, {} failed",
            report.repaired_ids.len(),
            report.errors.len()
        )?;
    }
    if let Some(next) = report.next_offset {
        writeln!(writer, "  Next page offset: {next}")?;
    }
    writeln!(writer, "{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}
