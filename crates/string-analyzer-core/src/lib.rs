use std::collections::HashSet;
use std::fmt::{self, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum AnalyzerError {
    #[error("string already exists: {0}")]
    AlreadyExists(String),
    #[error("string does not exist: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Character -> occurrence count map preserving first-occurrence order.
///
/// Serializes as a JSON object whose keys are single-character strings and
/// whose entry order matches the left-to-right scan of the source text.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CharacterFrequency(Vec<(char, u64)>);

impl CharacterFrequency {
    #[must_use]
    pub fn from_text(value: &str) -> Self {
        let mut entries: Vec<(char, u64)> = Vec::new();
        for ch in value.chars() {
            match entries.iter_mut().find(|(existing, _)| *existing == ch) {
                Some((_, count)) => *count += 1,
                None => entries.push((ch, 1)),
            }
        }
        Self(entries)
    }

    #[must_use]
    pub fn count_of(&self, ch: char) -> Option<u64> {
        self.0.iter().find(|(existing, _)| *existing == ch).map(|(_, count)| *count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, u64)> + '_ {
        self.0.iter().copied()
    }
}

impl Serialize for CharacterFrequency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        let mut key_buffer = [0_u8; 4];
        for (ch, count) in &self.0 {
            map.serialize_entry(ch.encode_utf8(&mut key_buffer), count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CharacterFrequency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FrequencyVisitor;

        impl<'de> Visitor<'de> for FrequencyVisitor {
            type Value = CharacterFrequency;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of single-character keys to occurrence counts")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, count)) = access.next_entry::<String, u64>()? {
                    let mut chars = key.chars();
                    let (Some(ch), None) = (chars.next(), chars.next()) else {
                        return Err(serde::de::Error::custom(format!(
                            "frequency key must be a single character, got `{key}`"
                        )));
                    };
                    entries.push((ch, count));
                }
                Ok(CharacterFrequency(entries))
            }
        }

        deserializer.deserialize_map(FrequencyVisitor)
    }
}

/// One analyzed string with its derived properties.
///
/// Records are write-once: every field is fixed at construction and the
/// original `value` doubles as the storage key. `id` and `sha256_hash` carry
/// the same digest so callers can regenerate it independently.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AnalyzedRecord {
    pub id: String,
    pub value: String,
    pub length: usize,
    pub is_palindrome: bool,
    pub unique_characters: usize,
    pub word_count: usize,
    pub sha256_hash: String,
    pub character_frequency: CharacterFrequency,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Lower-case hex SHA-256 digest over the UTF-8 bytes of `value`.
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{digest:x}")
}

fn is_palindrome(value: &str) -> bool {
    // Canonical form: lower-cased, ASCII alphanumerics only. The empty
    // canonical form reads the same both ways, so it counts as a palindrome.
    let canonical: Vec<char> =
        value.to_lowercase().chars().filter(char::is_ascii_alphanumeric).collect();
    canonical.iter().eq(canonical.iter().rev())
}

/// Derive the full property set for one input string.
///
/// Total over every string, including the empty string. Deterministic apart
/// from `created_at`, which is stamped at call time.
#[must_use]
pub fn analyze(value: &str) -> AnalyzedRecord {
    let digest = sha256_hex(value);
    AnalyzedRecord {
        id: digest.clone(),
        value: value.to_string(),
        length: value.chars().count(),
        is_palindrome: is_palindrome(value),
        unique_characters: value.chars().collect::<HashSet<_>>().len(),
        word_count: value.split_whitespace().count(),
        sha256_hash: digest,
        character_frequency: CharacterFrequency::from_text(value),
        created_at: OffsetDateTime::now_utc(),
    }
}

/// Optional query constraints shared by the structured list endpoint and the
/// natural-language translator. An absent field imposes no restriction.
///
/// Serialized field names match the structured endpoint's query parameters,
/// and `None` fields are omitted so filter echoes only carry what was set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct FilterSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_palindrome: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_character: Option<String>,
}

impl FilterSet {
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.is_palindrome.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.word_count.is_none()
            && self.contains_character.is_none()
    }

    /// AND of the four property constraints. `contains_character` is not
    /// evaluated here; it is a post-filter applied by the caller.
    #[must_use]
    pub fn matches_properties(&self, record: &AnalyzedRecord) -> bool {
        if let Some(is_palindrome) = self.is_palindrome {
            if record.is_palindrome != is_palindrome {
                return false;
            }
        }
        if let Some(min_length) = self.min_length {
            if record.length < min_length {
                return false;
            }
        }
        if let Some(max_length) = self.max_length {
            if record.length > max_length {
                return false;
            }
        }
        if let Some(word_count) = self.word_count {
            if record.word_count != word_count {
                return false;
            }
        }
        true
    }

    /// Case-insensitive substring containment over the original value. The
    /// store key stays case-sensitive; this asymmetry is deliberate.
    #[must_use]
    pub fn matches_contains_character(&self, record: &AnalyzedRecord) -> bool {
        match &self.contains_character {
            Some(needle) => record.value.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

// Translator patterns are fixed; construction cannot fail at runtime.
#[allow(clippy::expect_used)]
static LONGER_THAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"longer than (\d+)").expect("valid longer-than pattern"));

#[allow(clippy::expect_used)]
static CONTAINS_LETTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"contain(?:ing)?.*?letter\s+([a-z])").expect("valid letter pattern"));

/// Translate a free-text query into a [`FilterSet`].
///
/// The query is trimmed and lower-cased, then run through an ordered,
/// cumulative rule list. Every matching rule writes into the same filter set,
/// and a later rule may overwrite a field set by an earlier one; in
/// particular "first vowel" always wins over an explicit "letter <c>" match
/// because it runs last. That ordering is part of the observable contract.
///
/// Returns the normalized query text together with the parsed filters.
///
/// # Errors
/// Returns [`AnalyzerError::InvalidInput`] when the query is empty or
/// entirely whitespace.
pub fn interpret_query(query: &str) -> Result<(String, FilterSet), AnalyzerError> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AnalyzerError::InvalidInput(
            "unable to parse natural language query".to_string(),
        ));
    }

    let mut filters = FilterSet::default();

    if normalized.contains("palindrome") {
        filters.is_palindrome = Some(true);
    }

    if normalized.contains("single word") {
        filters.word_count = Some(1);
    } else if normalized.contains("two word") {
        filters.word_count = Some(2);
    }

    if let Some(captures) = LONGER_THAN_RE.captures(&normalized) {
        if let Some(bound) = captures.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
            // "longer than N" is strict: at least N + 1.
            filters.min_length = Some(bound.saturating_add(1));
        }
    }

    if let Some(captures) = CONTAINS_LETTER_RE.captures(&normalized) {
        if let Some(letter) = captures.get(1) {
            filters.contains_character = Some(letter.as_str().to_string());
        }
    }

    if normalized.contains("first vowel") {
        filters.contains_character = Some("a".to_string());
    }

    Ok((normalized, filters))
}
