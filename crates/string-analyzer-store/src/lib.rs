use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use string_analyzer_core::{AnalyzedRecord, AnalyzerError, FilterSet};

/// Concurrent in-memory store of analyzed strings, keyed by their original
/// `value`.
///
/// Records are immutable once inserted, so readers never observe partially
/// written state. Insert's existence check and write happen under one write
/// lock, which rules out a double-insert race for the same key. Enumeration
/// follows the key order of the underlying map; callers must not rely on any
/// particular ordering.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<BTreeMap<String, AnalyzedRecord>>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing panics while a guard is held, so a poisoned lock carries no
    // broken invariant; recover the inner map instead of propagating.
    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeMap<String, AnalyzedRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BTreeMap<String, AnalyzedRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert one record, keyed by its `value`.
    ///
    /// # Errors
    /// Returns [`AnalyzerError::AlreadyExists`] when a record with the same
    /// value is present; the store is left unchanged in that case.
    pub fn insert(&self, record: AnalyzedRecord) -> Result<(), AnalyzerError> {
        let mut records = self.write_guard();
        if records.contains_key(&record.value) {
            return Err(AnalyzerError::AlreadyExists(record.value));
        }
        records.insert(record.value.clone(), record);
        Ok(())
    }

    #[must_use]
    pub fn exists(&self, value: &str) -> bool {
        self.read_guard().contains_key(value)
    }

    #[must_use]
    pub fn get(&self, value: &str) -> Option<AnalyzedRecord> {
        self.read_guard().get(value).cloned()
    }

    /// Remove the record for `value`, returning whether one was present.
    pub fn delete(&self, value: &str) -> bool {
        self.write_guard().remove(value).is_some()
    }

    /// Every record satisfying the AND of the provided property constraints.
    ///
    /// Only `is_palindrome`, `min_length`, `max_length`, and `word_count`
    /// are evaluated here; `contains_character` composes across independent
    /// call sites and is applied by the caller after this returns.
    #[must_use]
    pub fn list_by_filters(&self, filters: &FilterSet) -> Vec<AnalyzedRecord> {
        self.read_guard()
            .values()
            .filter(|record| filters.matches_properties(record))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.read_guard().len()
    }

    pub fn clear(&self) {
        self.write_guard().clear();
    }
}
