//! Content-store port.
//!
//! The engine's only I/O boundary. Pages are returned in a stable order
//! (creation order), so offsets address the same records on every call.

use std::collections::BTreeSet;

use crate::error::StoreError;
use crate::record::ContentRecord;
use crate::style::{Category, Format};

/// One bounded page of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub category: Option<Category>,
    pub offset: usize,
    pub limit: usize,
}

/// Changes to persist for one repaired record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordUpdate<'a> {
    pub fragment: Option<&'a str>,
    pub format: Option<Format>,
}

/// Source and sink of content records.
pub trait ContentStore {
    /// Records matching `query`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the store cannot be queried.
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<ContentRecord>, StoreError>;

    /// A single record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, [`StoreError::Read`] otherwise.
    fn fetch_record(&self, id: &str) -> Result<ContentRecord, StoreError>;

    /// Apply every change in `update` to one record, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the record could not be updated. The
    /// stored record is then unchanged.
    fn write_update(&mut self, id: &str, update: &RecordUpdate<'_>) -> Result<(), StoreError>;

    /// Replace a record's fragment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the record could not be updated.
    fn write_fragment(&mut self, id: &str, fragment: &str) -> Result<(), StoreError> {
        self.write_update(
            id,
            &RecordUpdate {
                fragment: Some(fragment),
                format: None,
            },
        )
    }

    /// Replace a record's declared format.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the record could not be updated.
    fn write_format(&mut self, id: &str, format: Format) -> Result<(), StoreError> {
        self.write_update(
            id,
            &RecordUpdate {
                fragment: None,
                format: Some(format),
            },
        )
    }
}

/// In-memory store over a vector kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<ContentRecord>,
    failing_writes: BTreeSet<String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(records: Vec<ContentRecord>) -> Self {
        Self {
            records,
            failing_writes: BTreeSet::new(),
        }
    }

    /// Make every write to `id` fail, as a flaky backend would.
    #[must_use]
    pub fn with_failing_writes(mut self, id: impl Into<String>) -> Self {
        self.failing_writes.insert(id.into());
        self
    }

    #[must_use]
    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ContentRecord> {
        self.records
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ContentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut ContentRecord, StoreError> {
        if self.failing_writes.contains(id) {
            return Err(StoreError::Write {
                id: id.to_owned(),
                message: "write rejected by store".to_owned(),
            });
        }
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::Write {
                id: id.to_owned(),
                message: "record no longer exists".to_owned(),
            })
    }
}

impl ContentStore for MemoryStore {
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.category.is_none_or(|c| r.category == c))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn fetch_record(&self, id: &str) -> Result<ContentRecord, StoreError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    fn write_update(&mut self, id: &str, update: &RecordUpdate<'_>) -> Result<(), StoreError> {
        let record = self.record_mut(id)?;
        if let Some(fragment) = update.fragment {
            fragment.clone_into(&mut record.body);
        }
        if let Some(format) = update.format {
            record.format = format;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            ContentRecord::new("a", Category::Strength, Format::RepsAndSets, "<p>a</p>"),
            ContentRecord::new("b", Category::Cardio, Format::Circuit, "<p>b</p>"),
            ContentRecord::new("c", Category::Strength, Format::RepsAndSets, "<p>c</p>"),
        ])
    }

    fn ids(records: &[ContentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_fetch_page_keeps_creation_order() {
        let page = store()
            .fetch_page(&PageQuery {
                category: None,
                offset: 1,
                limit: 5,
            })
            .unwrap();
        assert_eq!(ids(&page), ["b", "c"]);
    }

    #[test]
    fn test_fetch_page_filters_by_category() {
        let page = store()
            .fetch_page(&PageQuery {
                category: Some(Category::Strength),
                offset: 0,
                limit: 1,
            })
            .unwrap();
        assert_eq!(ids(&page), ["a"]);
    }

    #[test]
    fn test_fetch_unknown_record() {
        assert_eq!(
            store().fetch_record("zzz"),
            Err(StoreError::NotFound("zzz".to_owned()))
        );
    }

    #[test]
    fn test_writes() {
        let mut store = store().with_failing_writes("c");
        store.write_fragment("a", "<p>A</p>").unwrap();
        store.write_format("b", Format::Amrap).unwrap();
        assert_eq!(store.get("a").unwrap().body, "<p>A</p>");
        assert_eq!(store.get("b").unwrap().format, Format::Amrap);
        assert!(matches!(
            store.write_fragment("c", "x"),
            Err(StoreError::Write { .. })
        ));
        assert_eq!(store.get("c").unwrap().body, "<p>c</p>");
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let mut store = store().with_failing_writes("a");
        let update = RecordUpdate {
            fragment: Some("<p>A</p>"),
            format: Some(Format::Amrap),
        };
        assert!(store.write_update("a", &update).is_err());
        let a = store.get("a").unwrap();
        assert_eq!(a.body, "<p>a</p>");
        assert_eq!(a.format, Format::RepsAndSets);

        store.write_update("b", &update).unwrap();
        let b = store.get("b").unwrap();
        assert_eq!(b.body, "<p>A</p>");
        assert_eq!(b.format, Format::Amrap);
    }
}
