use std::sync::Arc;

use serde::{Deserialize, Serialize};
use string_analyzer_core::{
    analyze, interpret_query, AnalyzedRecord, AnalyzerError, CharacterFrequency, FilterSet,
};
use string_analyzer_store::RecordStore;
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";

/// Derived properties block of a record response.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringProperties {
    pub length: usize,
    pub is_palindrome: bool,
    pub unique_characters: usize,
    pub word_count: usize,
    pub sha256_hash: String,
    pub character_frequency_map: CharacterFrequency,
}

/// Wire shape of one analyzed string.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringRecord {
    pub id: String,
    pub value: String,
    pub properties: StringProperties,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Wire shape of a structured-filter listing. `filters_applied` echoes only
/// the constraints that were actually set.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StringList {
    pub data: Vec<StringRecord>,
    pub count: usize,
    pub filters_applied: FilterSet,
}

/// Echo of a translated natural-language query: the normalized text and the
/// filter set the rule cascade produced from it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterpretedQuery {
    pub original: String,
    pub parsed_filters: FilterSet,
}

/// Wire shape of a natural-language query result.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NaturalLanguageResult {
    pub data: Vec<StringRecord>,
    pub count: usize,
    pub interpreted_query: InterpretedQuery,
}

fn to_string_record(record: AnalyzedRecord) -> StringRecord {
    StringRecord {
        id: record.id,
        properties: StringProperties {
            length: record.length,
            is_palindrome: record.is_palindrome,
            unique_characters: record.unique_characters,
            word_count: record.word_count,
            sha256_hash: record.sha256_hash,
            character_frequency_map: record.character_frequency,
        },
        value: record.value,
        created_at: record.created_at,
    }
}

/// Orchestration layer over the analysis pipeline and the record store.
///
/// Cloning is cheap; clones share the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct StringAnalyzerApi {
    store: Arc<RecordStore>,
}

impl StringAnalyzerApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Analyze `value` and insert the resulting record.
    ///
    /// # Errors
    /// Returns [`AnalyzerError::AlreadyExists`] when the value is already
    /// stored; a failed create leaves the store unchanged.
    pub fn create(&self, value: &str) -> Result<StringRecord, AnalyzerError> {
        let record = analyze(value);
        let response = to_string_record(record.clone());
        self.store.insert(record)?;
        tracing::debug!(id = %response.id, length = response.properties.length, "stored analyzed string");
        Ok(response)
    }

    /// Look up one record by its original value.
    ///
    /// # Errors
    /// Returns [`AnalyzerError::NotFound`] when no record exists for `value`.
    pub fn get(&self, value: &str) -> Result<StringRecord, AnalyzerError> {
        self.store
            .get(value)
            .map(to_string_record)
            .ok_or_else(|| AnalyzerError::NotFound(value.to_string()))
    }

    /// List every record matching the filter set, including the
    /// case-insensitive `contains_character` post-filter.
    #[must_use]
    pub fn list(&self, filters: FilterSet) -> StringList {
        let data = self.filtered_records(&filters);
        StringList { count: data.len(), data, filters_applied: filters }
    }

    /// Delete one record by its original value.
    ///
    /// # Errors
    /// Returns [`AnalyzerError::NotFound`] when nothing was removed.
    pub fn delete(&self, value: &str) -> Result<(), AnalyzerError> {
        if self.store.delete(value) {
            tracing::debug!(value, "deleted analyzed string");
            Ok(())
        } else {
            Err(AnalyzerError::NotFound(value.to_string()))
        }
    }

    /// Translate a free-text query and evaluate it through the structured
    /// filter path.
    ///
    /// # Errors
    /// Returns [`AnalyzerError::InvalidInput`] when the query is empty or
    /// entirely whitespace.
    pub fn query_natural_language(
        &self,
        query: &str,
    ) -> Result<NaturalLanguageResult, AnalyzerError> {
        let (original, parsed_filters) = interpret_query(query)?;
        let data = self.filtered_records(&parsed_filters);
        tracing::debug!(query = %original, matched = data.len(), "translated natural language query");
        Ok(NaturalLanguageResult {
            count: data.len(),
            data,
            interpreted_query: InterpretedQuery { original, parsed_filters },
        })
    }

    fn filtered_records(&self, filters: &FilterSet) -> Vec<StringRecord> {
        self.store
            .list_by_filters(filters)
            .into_iter()
            .filter(|record| filters.matches_contains_character(record))
            .map(to_string_record)
            .collect()
    }
}
