//! The per-vocabulary resolver.
//!
//! A [`LookupCache`] keeps the text/key pairs it has learned about in a
//! [`BiMap`], which keeps both directions mutual inverses: inserting a pair
//! evicts any stale pair sharing either its text or its key. The cache may hold
//! fewer pairs than the store, but never a pair the store disagrees with.
//!
//! Reads take a shared lock. Every store round trip that may teach the cache a
//! pair (creation, cold-cache backfill, refresh) runs under a separate creation
//! mutex, as does [`LookupCache::delete_all`]. Hot-path reads are never blocked
//! behind store I/O, and a backfill can never resurrect a pair deleted from the
//! store.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use bimap::BiMap;
use tracing::{debug, warn};

use crate::error::{LookupError, Result};
use crate::store::{Key, LookupStore, VocabularyEntry};

pub struct LookupCache {
    vocabulary: String,
    store: Arc<dyn LookupStore>,
    kept: RwLock<BiMap<String, Key>>,
    creation: Mutex<()>,
}

impl fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("vocabulary", &self.vocabulary)
            .finish_non_exhaustive()
    }
}

impl LookupCache {
    /// An empty cache over `store`.
    pub fn new(store: Arc<dyn LookupStore>) -> Self {
        Self {
            vocabulary: store.vocabulary().to_string(),
            store,
            kept: RwLock::new(BiMap::new()),
            creation: Mutex::new(()),
        }
    }
    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }
    pub fn store(&self) -> Arc<dyn LookupStore> {
        Arc::clone(&self.store)
    }

    /// Returns the key for `text`, creating the vocabulary entry on first sight.
    pub fn resolve_or_create(&self, text: &str) -> Result<Key> {
        if let Some(key) = self.key_for(text)? {
            return Ok(key);
        }
        let _creation = self.creation.lock()?;
        // someone may have resolved it while we waited
        if let Some(key) = self.key_for(text)? {
            return Ok(key);
        }
        debug!(vocabulary = %self.vocabulary, text, "cache miss, resolving through store");
        let entry = match self.store.find_or_create_by_text(text) {
            Ok(entry) => entry,
            Err(LookupError::DuplicateText { .. }) => {
                warn!(vocabulary = %self.vocabulary, text, "lost insert race, re-reading entry");
                self.store.find_by_text(text)?.ok_or_else(|| {
                    LookupError::Invariant(format!(
                        "'{}' was reported as a duplicate in vocabulary '{}' but cannot be found",
                        text, self.vocabulary
                    ))
                })?
            }
            Err(err) => return Err(err),
        };
        self.learn(&entry)?;
        Ok(entry.key())
    }

    /// Returns the text for `key`, falling back to the store on a cold cache.
    /// A key without a row yields `None`.
    pub fn text_for(&self, key: Key) -> Result<Option<String>> {
        if let Some(text) = self.cached_text(key)? {
            return Ok(Some(text));
        }
        let _creation = self.creation.lock()?;
        if let Some(text) = self.cached_text(key)? {
            return Ok(Some(text));
        }
        match self.store.find_by_key(key)? {
            Some(entry) => {
                self.learn(&entry)?;
                Ok(Some(entry.text().to_string()))
            }
            None => {
                warn!(vocabulary = %self.vocabulary, key, "dangling key, no entry in store");
                Ok(None)
            }
        }
    }

    /// Cached key for `text`, if any. Never touches the store.
    pub fn key_for(&self, text: &str) -> Result<Option<Key>> {
        Ok(self.kept.read()?.get_by_left(text).copied())
    }

    /// Like [`key_for`](Self::key_for), but asks the store when the cache has not
    /// seen `text`. Never creates an entry.
    pub fn find_key(&self, text: &str) -> Result<Option<Key>> {
        if let Some(key) = self.key_for(text)? {
            return Ok(Some(key));
        }
        let _creation = self.creation.lock()?;
        if let Some(key) = self.key_for(text)? {
            return Ok(Some(key));
        }
        match self.store.find_by_text(text)? {
            Some(entry) => {
                self.learn(&entry)?;
                Ok(Some(entry.key()))
            }
            None => Ok(None),
        }
    }

    /// Replaces the cache content with `entries`.
    pub fn preload<I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = VocabularyEntry>,
    {
        let mut snapshot = BiMap::new();
        for entry in entries {
            Self::check_key(&self.vocabulary, &entry)?;
            let (key, text) = entry.into_parts();
            if snapshot.insert_no_overwrite(text, key).is_err() {
                return Err(LookupError::Invariant(format!(
                    "vocabulary '{}' contains a conflicting entry for key {}",
                    self.vocabulary, key
                )));
            }
        }
        let loaded = snapshot.len();
        *self.kept.write()? = snapshot;
        debug!(vocabulary = %self.vocabulary, loaded, "preloaded cache");
        Ok(loaded)
    }

    /// Re-enumerates the store and replaces the cache content with what it holds.
    pub fn refresh(&self) -> Result<usize> {
        let _creation = self.creation.lock()?;
        let entries = self.store.all_entries()?;
        self.preload(entries)
    }

    /// Removes every row from the store and forgets every cached pair, with no
    /// creation or backfill in between.
    pub fn delete_all(&self) -> Result<()> {
        let _creation = self.creation.lock()?;
        self.store.delete_all()?;
        self.kept.write()?.clear();
        debug!(vocabulary = %self.vocabulary, "deleted all entries");
        Ok(())
    }

    /// Forgets every pair. The store is left as it is.
    pub fn clear(&self) -> Result<()> {
        self.kept.write()?.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.kept.read()?.len())
    }
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.kept.read()?.is_empty())
    }
    /// The pairs currently cached, ordered by key.
    pub fn entries(&self) -> Result<Vec<VocabularyEntry>> {
        let mut entries: Vec<VocabularyEntry> = self
            .kept
            .read()?
            .iter()
            .map(|(text, key)| VocabularyEntry::new(*key, text.clone()))
            .collect();
        entries.sort_unstable_by_key(|entry| entry.key());
        Ok(entries)
    }

    fn cached_text(&self, key: Key) -> Result<Option<String>> {
        Ok(self.kept.read()?.get_by_right(&key).cloned())
    }

    // The pair the store hands back is authoritative and overwrites whatever the
    // cache held for that text or that key.
    fn learn(&self, entry: &VocabularyEntry) -> Result<()> {
        Self::check_key(&self.vocabulary, entry)?;
        self.kept
            .write()?
            .insert(entry.text().to_string(), entry.key());
        Ok(())
    }
    fn check_key(vocabulary: &str, entry: &VocabularyEntry) -> Result<()> {
        if entry.key() <= 0 {
            return Err(LookupError::Invariant(format!(
                "store for vocabulary '{}' returned non-positive key {} for '{}'",
                vocabulary,
                entry.key(),
                entry.text()
            )));
        }
        Ok(())
    }
}
