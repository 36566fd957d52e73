//! Lookup values – small, slowly-changing vocabularies referenced by text and
//! stored by key.
//!
//! A host record type (a car, say) declares that one of its fields is a
//! *lookup attribute* over a vocabulary (car kinds). The record only ever stores
//! the vocabulary entry's surrogate key; reading and writing the attribute works
//! in terms of the text, and filters may be written in terms of the text too.
//!
//! ## Modules
//! * [`store`] – The [`store::LookupStore`] capability over one vocabulary table,
//!   plus an in-memory implementation.
//! * [`persist`] – [`persist::SqliteStore`], a SQLite vocabulary table.
//! * [`cache`] – [`cache::LookupCache`], the per-vocabulary bidirectional cache
//!   that creates entries on first sight and heals itself from the store.
//! * [`registry`] – [`registry::LookupRegistry`], one cache and store per
//!   vocabulary identifier, shared by every host type declaring it.
//! * [`host`] – [`host::HostType`] declarations and the attribute accessors.
//! * [`rewrite`] – [`rewrite::PredicateRewriter`], turning text conditions into
//!   key conditions.
//! * [`table`] – [`table::RecordTable`], a minimal query layer exposing filter and
//!   finder entry points.
//! * [`settings`] – configuration, SQLite connection setup and logging.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use lookup_values::{conditions, Declaration, HostType, LookupRegistry, MemoryStore, RecordTable};
//!
//! let registry = Arc::new(LookupRegistry::new());
//! let mut car = HostType::new("car").unwrap();
//! car.declare(&registry, Declaration::new("car_kind").exposed_as("kind"), |name| {
//!     Ok(MemoryStore::new(name))
//! })
//! .unwrap();
//! let cars = RecordTable::new(Arc::clone(&registry), car);
//! let bimba = cars.create([("kind", "Compact"), ("name", "Bimba")]).unwrap();
//! assert_eq!(cars.host().text(&bimba, "kind").unwrap().as_deref(), Some("Compact"));
//! assert_eq!(cars.filter(&conditions([("kind", "Compact")])).unwrap().len(), 1);
//! assert!(cars.filter(&conditions([("kind", "Sports")])).unwrap().is_empty());
//! ```
//!
//! ## Caching
//! Caches are never invalidated behind the scenes. A text renamed directly in
//! the backing store by another process is only observed after an explicit
//! [`cache::LookupCache::refresh`].

pub mod cache;
pub mod error;
pub mod host;
pub mod persist;
pub mod record;
pub mod registry;
pub mod rewrite;
pub mod settings;
pub mod store;
pub mod table;

pub use cache::LookupCache;
pub use error::{LookupError, Result};
pub use host::{Declaration, HostType, LookupBinding};
pub use persist::SqliteStore;
pub use record::{conditions, Condition, Record, RecordId, Value};
pub use registry::{LookupRegistry, Vocabulary};
pub use rewrite::{PredicateRewriter, Resolution};
pub use settings::Settings;
pub use store::{Key, LookupStore, MemoryStore, VocabularyEntry, UNMATCHED_KEY};
pub use table::RecordTable;
