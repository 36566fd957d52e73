//! Host types and their lookup attributes.
//!
//! A [`HostType`] is the declaration side of a record type: its name and the
//! lookup attributes it exposes. Declaring an attribute registers (or reuses) the
//! vocabulary in a [`LookupRegistry`] and installs a [`LookupBinding`], through
//! which text written to the attribute becomes a key on the record and keys on
//! the record read back as text.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::LookupCache;
use crate::error::{check_name, LookupError, Result};
use crate::record::{Record, Value};
use crate::registry::{LookupRegistry, NameHasher};
use crate::store::{Key, LookupStore, VocabularyEntry};

/// How a vocabulary is exposed on a host type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    vocabulary: String,
    attribute: Option<String>,
    key_field: Option<String>,
}
impl Declaration {
    /// Exposes `vocabulary` under its own name.
    pub fn new(vocabulary: &str) -> Self {
        Self {
            vocabulary: vocabulary.to_string(),
            attribute: None,
            key_field: None,
        }
    }
    /// Exposes the vocabulary under a different attribute name.
    pub fn exposed_as(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }
    /// Stores the key in `key_field` instead of `<attribute>_key`.
    pub fn stored_in(mut self, key_field: &str) -> Self {
        self.key_field = Some(key_field.to_string());
        self
    }
}

// ------------- LookupBinding -------------
/// An attribute bound to a vocabulary. The cache is looked up in the registry on
/// every use, so a vocabulary registered again after `unregister` is the one the
/// attribute reads and writes through.
pub struct LookupBinding {
    vocabulary: String,
    attribute: String,
    key_field: String,
    registry: Arc<LookupRegistry>,
}
impl fmt::Debug for LookupBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LookupBinding")
            .field("vocabulary", &self.vocabulary)
            .field("attribute", &self.attribute)
            .field("key_field", &self.key_field)
            .finish_non_exhaustive()
    }
}
impl LookupBinding {
    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
    pub fn key_field(&self) -> &str {
        &self.key_field
    }
    pub fn cache(&self) -> Result<Arc<LookupCache>> {
        self.registry.lookup(&self.vocabulary)?.ok_or_else(|| {
            LookupError::Invariant(format!(
                "attribute '{}' refers to unregistered vocabulary '{}'",
                self.attribute, self.vocabulary
            ))
        })
    }
}

// ------------- HostType -------------
pub struct HostType {
    name: String,
    bindings: HashMap<String, LookupBinding, NameHasher>,
}
impl HostType {
    pub fn new(name: &str) -> Result<Self> {
        check_name(name)?;
        Ok(Self {
            name: name.to_string(),
            bindings: HashMap::default(),
        })
    }
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a lookup attribute named after `vocabulary`.
    pub fn lookup<S, F>(
        &mut self,
        registry: &Arc<LookupRegistry>,
        vocabulary: &str,
        provision: F,
    ) -> Result<&LookupBinding>
    where
        S: LookupStore + 'static,
        F: FnOnce(&str) -> Result<S>,
    {
        self.declare(registry, Declaration::new(vocabulary), provision)
    }

    /// Declares a lookup attribute. The vocabulary is registered on first
    /// declaration by any host type and shared afterwards; `provision` is only
    /// called when the registry does not know the vocabulary yet.
    pub fn declare<S, F>(
        &mut self,
        registry: &Arc<LookupRegistry>,
        declaration: Declaration,
        provision: F,
    ) -> Result<&LookupBinding>
    where
        S: LookupStore + 'static,
        F: FnOnce(&str) -> Result<S>,
    {
        let Declaration {
            vocabulary,
            attribute,
            key_field,
        } = declaration;
        let attribute = attribute.unwrap_or_else(|| vocabulary.clone());
        let key_field = key_field.unwrap_or_else(|| format!("{}_key", attribute));
        check_name(&attribute)?;
        check_name(&key_field)?;
        registry.register(&vocabulary, Some(&self.name), provision)?;
        debug!(host = %self.name, %attribute, %vocabulary, %key_field, "declared lookup attribute");
        let binding = LookupBinding {
            vocabulary,
            attribute: attribute.clone(),
            key_field,
            registry: Arc::clone(registry),
        };
        self.bindings.insert(attribute.clone(), binding);
        self.binding_for(&attribute)
    }

    pub fn binding(&self, attribute: &str) -> Option<&LookupBinding> {
        self.bindings.get(attribute)
    }
    pub fn is_lookup(&self, attribute: &str) -> bool {
        self.bindings.contains_key(attribute)
    }
    /// Bindings ordered by attribute name.
    pub fn bindings(&self) -> Vec<&LookupBinding> {
        let mut bindings: Vec<&LookupBinding> = self.bindings.values().collect();
        bindings.sort_unstable_by(|a, b| a.attribute.cmp(&b.attribute));
        bindings
    }
    fn binding_for(&self, attribute: &str) -> Result<&LookupBinding> {
        self.bindings
            .get(attribute)
            .ok_or_else(|| LookupError::UnknownAttribute {
                host: self.name.clone(),
                attribute: attribute.to_string(),
            })
    }

    // functions that read and write lookup attributes on records

    /// Writes `text` to `attribute`, creating the vocabulary entry if needed.
    pub fn set_text(&self, record: &mut Record, attribute: &str, text: &str) -> Result<Key> {
        let binding = self.binding_for(attribute)?;
        let key = binding.cache()?.resolve_or_create(text)?;
        record.set(&binding.key_field, key);
        Ok(key)
    }
    /// Text of `attribute`, or `None` when no key is set or the key dangles.
    pub fn text(&self, record: &Record, attribute: &str) -> Result<Option<String>> {
        let binding = self.binding_for(attribute)?;
        match record.key(&binding.key_field) {
            Some(key) => binding.cache()?.text_for(key),
            None => Ok(None),
        }
    }
    pub fn key(&self, record: &Record, attribute: &str) -> Result<Option<Key>> {
        let binding = self.binding_for(attribute)?;
        Ok(record.key(&binding.key_field))
    }
    pub fn set_key(&self, record: &mut Record, attribute: &str, key: Option<Key>) -> Result<()> {
        let binding = self.binding_for(attribute)?;
        record.set(&binding.key_field, key);
        Ok(())
    }
    /// The vocabulary entry `attribute` points at.
    pub fn entry(&self, record: &Record, attribute: &str) -> Result<Option<VocabularyEntry>> {
        let binding = self.binding_for(attribute)?;
        match record.key(&binding.key_field) {
            Some(key) => Ok(binding
                .cache()?
                .text_for(key)?
                .map(|text| VocabularyEntry::new(key, text))),
            None => Ok(None),
        }
    }

    /// Assigns `value` to `field`. Lookup attributes take text (resolved to a key),
    /// an integer key, or null; any other field is stored as given.
    pub fn assign(&self, record: &mut Record, field: &str, value: Value) -> Result<()> {
        if !self.is_lookup(field) {
            record.set(field, value);
            return Ok(());
        }
        match value {
            Value::Text(text) => self.set_text(record, field, &text).map(|_| ()),
            Value::Integer(key) => self.set_key(record, field, Some(key)),
            Value::Null => self.set_key(record, field, None),
        }
    }
    /// A new, unsaved record built from `(field, value)` pairs through [`assign`](Self::assign).
    pub fn build<I, F, V>(&self, fields: I) -> Result<Record>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record::new();
        for (field, value) in fields {
            self.assign(&mut record, field.as_ref(), value.into())?;
        }
        Ok(record)
    }
    /// Every lookup attribute must hold a key.
    pub fn validate(&self, record: &Record) -> Result<()> {
        for binding in self.bindings() {
            if record.key(&binding.key_field).is_none() {
                return Err(LookupError::Missing {
                    host: self.name.clone(),
                    attribute: binding.attribute.clone(),
                });
            }
        }
        Ok(())
    }
}
