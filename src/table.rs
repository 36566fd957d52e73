//! A small in-memory query layer for host records.
//!
//! [`RecordTable`] keeps records of one [`HostType`] and offers the filter and
//! finder entry points. Every entry point routes its conditions through the
//! [`PredicateRewriter`] first, then matches the rewritten storage conditions
//! against the kept records.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::Result;
use crate::host::HostType;
use crate::record::{Condition, Record, RecordId, Value};
use crate::registry::LookupRegistry;
use crate::rewrite::{PredicateRewriter, Resolution};
use crate::store::Key;

#[derive(Debug, Default)]
struct Rows {
    kept: Vec<Record>,
    lower_bound: RecordId,
}

pub struct RecordTable {
    registry: Arc<LookupRegistry>,
    host: HostType,
    rows: Mutex<Rows>,
}

impl RecordTable {
    pub fn new(registry: Arc<LookupRegistry>, host: HostType) -> Self {
        Self {
            registry,
            host,
            rows: Mutex::new(Rows::default()),
        }
    }
    pub fn host(&self) -> &HostType {
        &self.host
    }
    pub fn registry(&self) -> Arc<LookupRegistry> {
        Arc::clone(&self.registry)
    }

    /// Validates and saves `record`, assigning an id to new records.
    pub fn save(&self, mut record: Record) -> Result<Record> {
        self.host.validate(&record)?;
        let mut rows = self.rows.lock()?;
        match record.id() {
            Some(id) => {
                if let Some(existing) = rows.kept.iter_mut().find(|r| r.id() == Some(id)) {
                    *existing = record.clone();
                    return Ok(record);
                }
                if id > rows.lower_bound {
                    rows.lower_bound = id;
                }
            }
            None => {
                rows.lower_bound += 1;
                let id = rows.lower_bound;
                record.set_id(id);
            }
        }
        rows.kept.push(record.clone());
        Ok(record)
    }
    /// Builds a record from `(field, value)` pairs and saves it.
    pub fn create<I, F, V>(&self, fields: I) -> Result<Record>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<str>,
        V: Into<Value>,
    {
        let record = self.host.build(fields)?;
        self.save(record)
    }
    pub fn all(&self) -> Result<Vec<Record>> {
        Ok(self.rows.lock()?.kept.clone())
    }
    pub fn count(&self) -> Result<usize> {
        Ok(self.rows.lock()?.kept.len())
    }
    pub fn delete_all(&self) -> Result<()> {
        self.rows.lock()?.kept.clear();
        Ok(())
    }

    // filter and finder entry points

    /// Records matching every condition. Never creates vocabulary entries.
    pub fn filter(&self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let storage = self.rewrite(conditions, Resolution::ReadOnly)?;
        self.select(&storage)
    }
    pub fn count_matching(&self, conditions: &[Condition]) -> Result<usize> {
        Ok(self.filter(conditions)?.len())
    }
    /// First record matching every condition.
    pub fn find_by(&self, conditions: &[Condition]) -> Result<Option<Record>> {
        Ok(self.filter(conditions)?.into_iter().next())
    }
    pub fn find_all_by(&self, conditions: &[Condition]) -> Result<Vec<Record>> {
        self.filter(conditions)
    }
    /// First record matching every condition, or a new saved record built from
    /// them. Lookup text in the conditions is materialized either way.
    pub fn find_or_create_by(&self, conditions: &[Condition]) -> Result<Record> {
        let storage = self.rewrite(conditions, Resolution::Materialize)?;
        if let Some(found) = self.select(&storage)?.into_iter().next() {
            return Ok(found);
        }
        let record = self.initialize(conditions)?;
        debug!(host = %self.host.name(), %record, "creating record from finder conditions");
        self.save(record)
    }
    /// First record matching every condition, or a new unsaved record built from
    /// them. The lookup itself never creates vocabulary entries; building the new
    /// record assigns its lookup text like any other write.
    pub fn find_or_initialize_by(&self, conditions: &[Condition]) -> Result<Record> {
        if let Some(found) = self.find_by(conditions)? {
            return Ok(found);
        }
        self.initialize(conditions)
    }
    /// Records whose `attribute` points at `key`.
    pub fn referring(&self, attribute: &str, key: Key) -> Result<Vec<Record>> {
        self.filter(&[Condition::new(attribute, key)])
    }

    fn rewrite(&self, conditions: &[Condition], resolution: Resolution) -> Result<Vec<Condition>> {
        PredicateRewriter::new(&self.registry).rewrite(&self.host, conditions, resolution)
    }
    fn initialize(&self, conditions: &[Condition]) -> Result<Record> {
        self.host.build(
            conditions
                .iter()
                .map(|condition| (condition.field(), condition.value().clone())),
        )
    }
    fn select(&self, storage: &[Condition]) -> Result<Vec<Record>> {
        Ok(self
            .rows
            .lock()?
            .kept
            .iter()
            .filter(|record| storage.iter().all(|condition| condition.matches(record)))
            .cloned()
            .collect())
    }
}
