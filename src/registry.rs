//! Directory of vocabularies.
//!
//! A [`LookupRegistry`] owns one [`Vocabulary`] (store plus cache) per vocabulary
//! identifier. It is an ordinary value: create one per process, or one per test
//! for isolation, and hand it to whatever declares host types or rewrites filters.

use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Mutex, RwLock};

use seahash::SeaHasher;
use tracing::{debug, info};

use crate::cache::LookupCache;
use crate::error::{check_name, Result};
use crate::store::LookupStore;

pub type NameHasher = BuildHasherDefault<SeaHasher>;

// ------------- Vocabulary -------------
/// A registered vocabulary: its store, the one cache over it, and the host types
/// that refer to it.
pub struct Vocabulary {
    name: String,
    store: Arc<dyn LookupStore>,
    cache: Arc<LookupCache>,
    referrers: Mutex<BTreeSet<String>>,
}
impl Vocabulary {
    fn new(name: &str, store: Arc<dyn LookupStore>) -> Self {
        Self {
            name: name.to_string(),
            cache: Arc::new(LookupCache::new(Arc::clone(&store))),
            store,
            referrers: Mutex::new(BTreeSet::new()),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn store(&self) -> Arc<dyn LookupStore> {
        Arc::clone(&self.store)
    }
    pub fn cache(&self) -> Arc<LookupCache> {
        Arc::clone(&self.cache)
    }
    /// Host types that declared an attribute over this vocabulary, by name.
    pub fn referrers(&self) -> Result<Vec<String>> {
        Ok(self.referrers.lock()?.iter().cloned().collect())
    }
    /// Number of rows in the backing store.
    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }
    /// Removes every row from the store and forgets the cached pairs with them.
    pub fn delete_all(&self) -> Result<()> {
        self.cache.delete_all()
    }
    fn refer(&self, host: &str) -> Result<bool> {
        Ok(self.referrers.lock()?.insert(host.to_string()))
    }
}

// ------------- Registry -------------
pub struct LookupRegistry {
    vocabularies: RwLock<HashMap<String, Arc<Vocabulary>, NameHasher>>,
    // serializes registrations, so lookups never wait behind a slow provision
    registering: Mutex<()>,
    preload: bool,
}
impl Default for LookupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
impl LookupRegistry {
    pub fn new() -> Self {
        Self {
            vocabularies: RwLock::new(HashMap::default()),
            registering: Mutex::new(()),
            preload: true,
        }
    }
    /// A registry whose caches start empty even over populated stores and fill
    /// lazily instead.
    pub fn without_preload() -> Self {
        Self {
            preload: false,
            ..Self::new()
        }
    }

    /// Registers `vocabulary`, provisioning its store and preloading its cache on
    /// first registration. Later registrations return the existing cache and do not
    /// call `provision`. When `referrer` is given, that host type is recorded as
    /// referring to the vocabulary either way. Registrations run one at a time;
    /// lookups of registered vocabularies proceed meanwhile.
    pub fn register<S, F>(
        &self,
        vocabulary: &str,
        referrer: Option<&str>,
        provision: F,
    ) -> Result<Arc<LookupCache>>
    where
        S: LookupStore + 'static,
        F: FnOnce(&str) -> Result<S>,
    {
        check_name(vocabulary)?;
        if let Some(existing) = self.vocabulary(vocabulary)? {
            return Self::attach(&existing, referrer);
        }
        let _registering = self.registering.lock()?;
        // first registration wins, a concurrent one may have beaten us here
        if let Some(existing) = self.vocabulary(vocabulary)? {
            return Self::attach(&existing, referrer);
        }
        let store: Arc<dyn LookupStore> = Arc::new(provision(vocabulary)?);
        let kept = Vocabulary::new(vocabulary, store);
        if self.preload {
            let loaded = kept.cache.preload(kept.store.all_entries()?)?;
            info!(vocabulary, loaded, "registered vocabulary");
        } else {
            info!(vocabulary, "registered vocabulary without preload");
        }
        let kept = Arc::new(kept);
        self.vocabularies
            .write()?
            .insert(vocabulary.to_string(), Arc::clone(&kept));
        Self::attach(&kept, referrer)
    }
    fn attach(kept: &Vocabulary, referrer: Option<&str>) -> Result<Arc<LookupCache>> {
        if let Some(host) = referrer {
            if kept.refer(host)? {
                debug!(vocabulary = %kept.name, host, "recorded referring host type");
            }
        }
        Ok(kept.cache())
    }

    pub fn vocabulary(&self, vocabulary: &str) -> Result<Option<Arc<Vocabulary>>> {
        Ok(self.vocabularies.read()?.get(vocabulary).cloned())
    }
    pub fn lookup(&self, vocabulary: &str) -> Result<Option<Arc<LookupCache>>> {
        Ok(self
            .vocabularies
            .read()?
            .get(vocabulary)
            .map(|kept| kept.cache()))
    }
    /// Drops the vocabulary from the registry. Store contents are left as they are.
    pub fn unregister(&self, vocabulary: &str) -> Result<Option<Arc<Vocabulary>>> {
        let removed = self.vocabularies.write()?.remove(vocabulary);
        if removed.is_some() {
            info!(vocabulary, "unregistered vocabulary");
        }
        Ok(removed)
    }
    /// Registered vocabulary identifiers, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.vocabularies.read()?.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
    pub fn len(&self) -> Result<usize> {
        Ok(self.vocabularies.read()?.len())
    }
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.vocabularies.read()?.is_empty())
    }
}
