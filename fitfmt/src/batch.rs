//! Batch orchestrator and invocation boundary.
//!
//! A page is processed one record at a time, in store order. Each record runs
//! inside its own error boundary: a panic or a failed write becomes an entry in
//! the report's `errors` and the page moves on. Only store reads and invalid
//! page requests fail the whole call.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{BatchError, RecordError, StoreError};
use crate::record::ContentRecord;
use crate::repair::{RepairOutcome, Repairer};
use crate::report::{AuditReport, RepairReport};
use crate::rules::FormatRules;
use crate::store::{ContentStore, PageQuery, RecordUpdate};
use crate::style::{Category, StyleGuide};
use crate::validator::Validator;

/// Which records a call addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// `limit` records from `offset`, optionally within one category.
    /// A `None` limit means the configured default batch size.
    Range {
        offset: usize,
        limit: Option<usize>,
        category: Option<Category>,
    },
    /// A single record by id.
    Target(String),
}

impl Page {
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Page::Range {
            offset: 0,
            limit: Some(limit),
            category: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Compute the report without writing anything back.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Audit,
    Repair,
}

/// A request from an external caller (admin tooling, scheduled job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default)]
    pub dry_run: bool,
}

impl Invocation {
    /// The page this invocation addresses; a target id wins over a range.
    #[must_use]
    pub fn page(&self) -> Page {
        match &self.target_id {
            Some(id) => Page::Target(id.clone()),
            None => Page::Range {
                offset: self.offset.unwrap_or(0),
                limit: self.batch_size,
                category: self.category,
            },
        }
    }
}

/// The report matching an [`Invocation`]'s mode.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum InvocationResponse {
    Audit(AuditReport),
    Repair(RepairReport),
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// The integrity engine: validator, repairer and rule engine over one shared guide.
#[derive(Debug, Clone)]
pub struct Engine {
    guide: Arc<StyleGuide>,
    config: EngineConfig,
    validator: Validator,
    repairer: Repairer,
    rules: FormatRules,
}

impl Engine {
    /// Build every component from the same guide.
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>, config: EngineConfig) -> Self {
        Self {
            validator: Validator::new(Arc::clone(&guide)),
            repairer: Repairer::new(Arc::clone(&guide)),
            rules: FormatRules::new(Arc::clone(&guide)),
            guide,
            config,
        }
    }

    /// The built-in guide with default settings.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(Arc::new(StyleGuide::standard()), EngineConfig::default())
    }

    #[must_use]
    pub fn guide(&self) -> &Arc<StyleGuide> {
        &self.guide
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub fn repairer(&self) -> &Repairer {
        &self.repairer
    }

    #[must_use]
    pub fn rules(&self) -> &FormatRules {
        &self.rules
    }

    /// Audit one page. Never writes to the store.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] if the page request is invalid or the store cannot be read.
    pub fn run_audit<S>(&self, store: &S, page: &Page) -> Result<AuditReport, BatchError>
    where
        S: ContentStore + ?Sized,
    {
        let (records, next_offset) = self.fetch(store, page)?;
        let mut report = AuditReport::new();
        report.next_offset = next_offset;

        for record in &records {
            match self.guarded(|| self.validator.validate(record)) {
                Ok(violations) => {
                    debug!(record = %record.id, violations = violations.len(), "audited record");
                    report.add_record(&record.id, violations);
                }
                Err(error) => {
                    warn!(record = %record.id, %error, "audit failed for record");
                    report.add_error(RecordError::new(&record.id, error));
                }
            }
        }

        info!(
            scanned = report.total_scanned,
            violating = report.violating,
            errors = report.errors.len(),
            "audit page complete"
        );
        Ok(report)
    }

    /// Repair one page, persisting each changed record before moving on.
    ///
    /// A failed write is not rolled back or retried; re-running the page is
    /// safe because repair is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] if the page request is invalid or the store cannot be read.
    pub fn run_repair<S>(
        &self,
        store: &mut S,
        page: &Page,
        options: RepairOptions,
    ) -> Result<RepairReport, BatchError>
    where
        S: ContentStore + ?Sized,
    {
        let (records, next_offset) = self.fetch(store, page)?;
        let mut report = RepairReport::new(options.dry_run);
        report.next_offset = next_offset;

        for record in &records {
            let outcome = match self.guarded(|| self.repairer.repair(record)) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(record = %record.id, %error, "repair failed for record");
                    report.add_error(RecordError::new(&record.id, error));
                    continue;
                }
            };
            if !outcome.needs_write() {
                report.add_skipped(&record.id, &outcome.stats);
                continue;
            }
            if !options.dry_run
                && let Err(err) = persist(store, &record.id, &outcome)
            {
                warn!(record = %record.id, error = %err, "could not persist repair");
                report.add_error(RecordError::new(&record.id, err.to_string()));
                continue;
            }
            report.add_repaired(&record.id, &outcome.stats);
        }

        info!(
            processed = report.total_processed,
            repaired = report.repaired_ids.len(),
            errors = report.errors.len(),
            dry_run = options.dry_run,
            "repair page complete"
        );
        Ok(report)
    }

    /// Serve one external invocation.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] if the page request is invalid or the store cannot be read.
    pub fn invoke<S>(
        &self,
        store: &mut S,
        invocation: &Invocation,
    ) -> Result<InvocationResponse, BatchError>
    where
        S: ContentStore + ?Sized,
    {
        let page = invocation.page();
        match invocation.mode {
            Mode::Audit => self.run_audit(store, &page).map(InvocationResponse::Audit),
            Mode::Repair => self
                .run_repair(
                    store,
                    &page,
                    RepairOptions {
                        dry_run: invocation.dry_run,
                    },
                )
                .map(InvocationResponse::Repair),
        }
    }

    fn fetch<S>(
        &self,
        store: &S,
        page: &Page,
    ) -> Result<(Vec<ContentRecord>, Option<usize>), BatchError>
    where
        S: ContentStore + ?Sized,
    {
        match page {
            Page::Target(id) => Ok((vec![store.fetch_record(id)?], None)),
            Page::Range {
                offset,
                limit,
                category,
            } => {
                let limit = limit.unwrap_or(self.config.default_batch_size);
                if limit == 0 || limit > self.config.max_batch_size {
                    return Err(BatchError::InvalidPage(format!(
                        "batch size must be between 1 and {}, got {limit}",
                        self.config.max_batch_size
                    )));
                }
                let records = store.fetch_page(&PageQuery {
                    category: *category,
                    offset: *offset,
                    limit,
                })?;
                let next = (records.len() == limit).then_some(offset + limit);
                Ok((records, next))
            }
        }
    }

    /// Run one record's work inside the per-record boundary.
    fn guarded<T>(&self, work: impl FnOnce() -> T) -> Result<T, String> {
        if !self.config.catch_panics {
            return Ok(work());
        }
        panic::catch_unwind(AssertUnwindSafe(work))
            .map_err(|payload| format!("panicked: {}", panic_payload_to_string(payload.as_ref())))
    }
}

/// Persist a repair as one store update, so a failed write leaves the record as it was.
fn persist<S>(store: &mut S, id: &str, outcome: &RepairOutcome) -> Result<(), StoreError>
where
    S: ContentStore + ?Sized,
{
    let update = RecordUpdate {
        fragment: outcome.new_fragment.as_deref(),
        format: outcome.new_format,
    };
    store.write_update(id, &update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::style::Format;

    fn record(id: &str, body: &str) -> ContentRecord {
        ContentRecord::new(id, Category::Cardio, Format::Circuit, body)
    }

    /// A store whose reads always fail.
    struct DownStore;

    impl ContentStore for DownStore {
        fn fetch_page(&self, _: &PageQuery) -> Result<Vec<ContentRecord>, StoreError> {
            Err(StoreError::Read("connection refused".to_owned()))
        }
        fn fetch_record(&self, _: &str) -> Result<ContentRecord, StoreError> {
            Err(StoreError::Read("connection refused".to_owned()))
        }
        fn write_update(&mut self, _: &str, _: &RecordUpdate<'_>) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// A store that accepts fragment changes but rejects any format change.
    struct NoFormatWrites(MemoryStore);

    impl ContentStore for NoFormatWrites {
        fn fetch_page(&self, query: &PageQuery) -> Result<Vec<ContentRecord>, StoreError> {
            self.0.fetch_page(query)
        }
        fn fetch_record(&self, id: &str) -> Result<ContentRecord, StoreError> {
            self.0.fetch_record(id)
        }
        fn write_update(&mut self, id: &str, update: &RecordUpdate<'_>) -> Result<(), StoreError> {
            if update.format.is_some() {
                return Err(StoreError::Write {
                    id: id.to_owned(),
                    message: "down".to_owned(),
                });
            }
            self.0.write_update(id, update)
        }
    }

    #[test]
    fn test_invalid_page_sizes() {
        let engine = Engine::standard();
        let store = MemoryStore::default();
        for limit in [0, 201] {
            let err = engine.run_audit(&store, &Page::first(limit)).unwrap_err();
            assert!(matches!(err, BatchError::InvalidPage(_)), "{err}");
        }
    }

    #[test]
    fn test_store_read_failure_fails_the_page() {
        let err = Engine::standard()
            .run_audit(&DownStore, &Page::first(10))
            .unwrap_err();
        assert!(matches!(err, BatchError::Store(StoreError::Read(_))));
    }

    #[test]
    fn test_unknown_target() {
        let err = Engine::standard()
            .run_audit(&MemoryStore::default(), &Page::Target("nope".to_owned()))
            .unwrap_err();
        assert!(matches!(err, BatchError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn test_next_offset_only_for_full_pages() {
        let store = MemoryStore::new(vec![record("a", ""), record("b", ""), record("c", "")]);
        let engine = Engine::standard();
        let full = engine.run_audit(&store, &Page::first(2)).unwrap();
        assert_eq!(full.next_offset, Some(2));
        let rest = engine
            .run_audit(
                &store,
                &Page::Range {
                    offset: 2,
                    limit: Some(2),
                    category: None,
                },
            )
            .unwrap();
        assert_eq!(rest.total_scanned, 1);
        assert_eq!(rest.next_offset, None);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let body = "<p class='x'>A</p>";
        let mut store = MemoryStore::new(vec![record("a", body)]);
        let report = Engine::standard()
            .run_repair(&mut store, &Page::first(5), RepairOptions { dry_run: true })
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.repaired_ids, ["a"]);
        assert_eq!(store.get("a").unwrap().body, body);
    }

    #[test]
    fn test_failed_format_write_keeps_fragment_unchanged() {
        let body = "<p class='x'>A</p>";
        let mut store = NoFormatWrites(MemoryStore::new(vec![ContentRecord::new(
            "s",
            Category::Strength,
            Format::Tabata,
            body,
        )]));
        let report = Engine::standard()
            .run_repair(&mut store, &Page::first(5), RepairOptions::default())
            .unwrap();

        assert!(report.repaired_ids.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].error.contains("down"));
        let stored = store.0.get("s").unwrap();
        assert_eq!(stored.body, body);
        assert_eq!(stored.format, Format::Tabata);
    }

    #[test]
    fn test_invocation_defaults() {
        let invocation: Invocation = serde_json::from_str(r#"{"mode":"audit"}"#).unwrap();
        assert_eq!(
            invocation.page(),
            Page::Range {
                offset: 0,
                limit: None,
                category: None
            }
        );
        let targeted: Invocation =
            serde_json::from_str(r#"{"mode":"repair","targetId":"w-9","offset":40}"#).unwrap();
        assert_eq!(targeted.page(), Page::Target("w-9".to_owned()));
    }

    #[test]
    fn test_invoke_tags_response_with_mode() {
        let mut store = MemoryStore::new(vec![record("a", "<p>x</p>")]);
        let invocation: Invocation =
            serde_json::from_str(r#"{"mode":"repair","dryRun":true,"category":"CARDIO"}"#).unwrap();
        let response = Engine::standard().invoke(&mut store, &invocation).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "repair");
        assert_eq!(json["totalProcessed"], 1);
        assert_eq!(json["dryRun"], true);
    }

    #[test]
    fn test_panic_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_payload_to_string(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_payload_to_string(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_payload_to_string(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_guarded_catches_panics() {
        let engine = Engine::standard();
        let caught = engine.guarded(|| -> usize { panic!("bad record") });
        assert_eq!(caught, Err("panicked: bad record".to_owned()));
    }
}
