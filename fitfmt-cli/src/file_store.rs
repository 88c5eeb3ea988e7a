//! Content store backed by a JSON file holding an array of records.
//!
//! The whole file is loaded on open and written back by [`JsonFileStore::save`];
//! array order is the store's creation order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fitfmt::{ContentRecord, ContentStore, MemoryStore, PageQuery, RecordUpdate, StoreError};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    dirty: bool,
}

impl JsonFileStore {
    /// Load every record from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not an array of records
    /// (an unknown category or format is rejected here).
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read store {}", path.display()))?;
        let records: Vec<ContentRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse records in {}", path.display()))?;
        Ok(Self {
            path,
            inner: MemoryStore::new(records),
            dirty: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn records(&self) -> &[ContentRecord] {
        self.inner.records()
    }

    /// Whether a write happened since the last load or save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write all records back to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self.inner.records())?;
        fs::write(&self.path, format!("{json}\n"))
            .with_context(|| format!("Failed to write store {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

impl ContentStore for JsonFileStore {
    fn fetch_page(&self, query: &PageQuery) -> Result<Vec<ContentRecord>, StoreError> {
        self.inner.fetch_page(query)
    }

    fn fetch_record(&self, id: &str) -> Result<ContentRecord, StoreError> {
        self.inner.fetch_record(id)
    }

    fn write_update(&mut self, id: &str, update: &RecordUpdate<'_>) -> Result<(), StoreError> {
        self.inner.write_update(id, update)?;
        self.dirty = true;
        Ok(())
    }
}
