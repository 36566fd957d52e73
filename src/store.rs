//! The backing-store capability a vocabulary needs.
//!
//! A [`LookupStore`] is scoped to exactly one vocabulary table. The resolver only
//! ever asks it for a full scan, a key lookup, a unique-text lookup and an
//! insert-or-fetch by unique text. Caching is never a store concern.

use std::fmt;
use std::sync::Mutex;

use bimap::BiMap;

use crate::error::{LookupError, Result};

/// Store-assigned surrogate key of a vocabulary entry.
pub type Key = i64;

/// Stores only ever assign positive keys, so this value can stand in for a
/// filter that must match nothing.
pub const UNMATCHED_KEY: Key = -1;

/// A backing-store row: an immutable key and the unique text it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VocabularyEntry {
    key: Key,
    text: String,
}
impl VocabularyEntry {
    pub fn new(key: Key, text: String) -> Self {
        Self { key, text }
    }
    pub fn key(&self) -> Key {
        self.key
    }
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn into_parts(self) -> (Key, String) {
        (self.key, self.text)
    }
}
impl fmt::Display for VocabularyEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, \"{}\")", self.key, self.text)
    }
}

pub trait LookupStore: Send + Sync {
    /// Identifier of the vocabulary this store is scoped to.
    fn vocabulary(&self) -> &str;
    /// Full scan, only used when preloading a cache.
    fn all_entries(&self) -> Result<Vec<VocabularyEntry>>;
    fn find_by_key(&self, key: Key) -> Result<Option<VocabularyEntry>>;
    fn find_by_text(&self, text: &str) -> Result<Option<VocabularyEntry>>;
    /// Returns the existing row for `text`, or inserts one. Losing an insert race
    /// against another writer yields [`LookupError::DuplicateText`], never a
    /// generic failure, so callers can retry as a lookup.
    fn find_or_create_by_text(&self, text: &str) -> Result<VocabularyEntry>;
    /// Removes every row of the vocabulary.
    fn delete_all(&self) -> Result<()>;
    fn count(&self) -> Result<usize> {
        Ok(self.all_entries()?.len())
    }
}

/// Rejects text that cannot be a vocabulary value.
pub(crate) fn check_text(vocabulary: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(LookupError::BlankText {
            vocabulary: vocabulary.to_string(),
        });
    }
    Ok(())
}

// ------------- MemoryStore -------------
#[derive(Debug)]
struct MemoryRows {
    rows: BiMap<String, Key>,
    lower_bound: Key,
}

/// A process-local store, handy for tests and for vocabularies that need no
/// durability. Keys are handed out like rowids: increasing, starting at 1, never
/// reused while the store lives.
#[derive(Debug)]
pub struct MemoryStore {
    vocabulary: String,
    kept: Mutex<MemoryRows>,
}
impl MemoryStore {
    pub fn new(vocabulary: &str) -> Self {
        Self {
            vocabulary: vocabulary.to_string(),
            kept: Mutex::new(MemoryRows {
                rows: BiMap::new(),
                lower_bound: 0,
            }),
        }
    }
    /// Builds a store that already holds `texts`, keyed in order.
    pub fn with_entries<I, S>(vocabulary: &str, texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new(vocabulary);
        for text in texts {
            store.find_or_create_by_text(text.as_ref())?;
        }
        Ok(store)
    }
}
impl LookupStore for MemoryStore {
    fn vocabulary(&self) -> &str {
        &self.vocabulary
    }
    fn all_entries(&self) -> Result<Vec<VocabularyEntry>> {
        let kept = self.kept.lock()?;
        let mut entries: Vec<VocabularyEntry> = kept
            .rows
            .iter()
            .map(|(text, key)| VocabularyEntry::new(*key, text.clone()))
            .collect();
        entries.sort_unstable_by_key(|entry| entry.key());
        Ok(entries)
    }
    fn find_by_key(&self, key: Key) -> Result<Option<VocabularyEntry>> {
        let kept = self.kept.lock()?;
        Ok(kept
            .rows
            .get_by_right(&key)
            .map(|text| VocabularyEntry::new(key, text.clone())))
    }
    fn find_by_text(&self, text: &str) -> Result<Option<VocabularyEntry>> {
        let kept = self.kept.lock()?;
        Ok(kept
            .rows
            .get_by_left(text)
            .map(|key| VocabularyEntry::new(*key, text.to_string())))
    }
    fn find_or_create_by_text(&self, text: &str) -> Result<VocabularyEntry> {
        check_text(&self.vocabulary, text)?;
        let mut kept = self.kept.lock()?;
        if let Some(key) = kept.rows.get_by_left(text) {
            return Ok(VocabularyEntry::new(*key, text.to_string()));
        }
        kept.lower_bound += 1;
        let key = kept.lower_bound;
        kept.rows.insert(text.to_string(), key);
        Ok(VocabularyEntry::new(key, text.to_string()))
    }
    fn delete_all(&self) -> Result<()> {
        self.kept.lock()?.rows.clear();
        Ok(())
    }
    fn count(&self) -> Result<usize> {
        Ok(self.kept.lock()?.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_creates_once() {
        let store = MemoryStore::new("car_kind");
        let compact = store.find_or_create_by_text("Compact").unwrap();
        let again = store.find_or_create_by_text("Compact").unwrap();
        let sports = store.find_or_create_by_text("Sports").unwrap();
        assert_eq!(compact, again);
        assert_eq!(compact.key(), 1);
        assert_eq!(sports.key(), 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn memory_store_keys_are_not_reused_after_delete() {
        let store = MemoryStore::with_entries("car_kind", ["Compact", "Sports"]).unwrap();
        store.delete_all().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        let entry = store.find_or_create_by_text("Compact").unwrap();
        assert_eq!(entry.key(), 3);
    }

    #[test]
    fn memory_store_rejects_blank_text() {
        let store = MemoryStore::new("car_color");
        assert!(matches!(
            store.find_or_create_by_text("  "),
            Err(LookupError::BlankText { .. })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }
}
