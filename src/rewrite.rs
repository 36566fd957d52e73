//! Rewriting filter conditions over lookup text into conditions over keys.

use tracing::debug;

use crate::error::{LookupError, Result};
use crate::host::HostType;
use crate::record::{Condition, Value};
use crate::registry::LookupRegistry;
use crate::store::UNMATCHED_KEY;

/// What to do with lookup text the vocabulary does not contain yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Never create entries. Unknown text becomes a condition that matches nothing.
    ReadOnly,
    /// Create the entry, for callers whose contract is to materialize the value.
    Materialize,
}

pub struct PredicateRewriter<'r> {
    registry: &'r LookupRegistry,
}

impl<'r> PredicateRewriter<'r> {
    pub fn new(registry: &'r LookupRegistry) -> Self {
        Self { registry }
    }

    /// Rewrites `conditions` for `host`. Conditions on lookup attributes are moved
    /// to the attribute's key field with a resolved key; all others pass through.
    /// Order is preserved.
    pub fn rewrite(
        &self,
        host: &HostType,
        conditions: &[Condition],
        resolution: Resolution,
    ) -> Result<Vec<Condition>> {
        conditions
            .iter()
            .map(|condition| self.rewrite_one(host, condition, resolution))
            .collect()
    }

    fn rewrite_one(
        &self,
        host: &HostType,
        condition: &Condition,
        resolution: Resolution,
    ) -> Result<Condition> {
        let binding = match host.binding(condition.field()) {
            Some(binding) => binding,
            None => return Ok(condition.clone()),
        };
        let key = match condition.value() {
            Value::Null => Value::Null,
            // already a key
            Value::Integer(key) => Value::Integer(*key),
            Value::Text(text) => {
                let cache = self.registry.lookup(binding.vocabulary())?.ok_or_else(|| {
                    LookupError::Invariant(format!(
                        "attribute '{}' of {} refers to unregistered vocabulary '{}'",
                        binding.attribute(),
                        host.name(),
                        binding.vocabulary()
                    ))
                })?;
                match resolution {
                    Resolution::Materialize => Value::Integer(cache.resolve_or_create(text)?),
                    Resolution::ReadOnly => match cache.find_key(text)? {
                        Some(key) => Value::Integer(key),
                        None => {
                            debug!(
                                vocabulary = binding.vocabulary(),
                                text = text.as_str(),
                                "unknown lookup text in filter, matching nothing"
                            );
                            Value::Integer(UNMATCHED_KEY)
                        }
                    },
                }
            }
        };
        Ok(Condition::new(binding.key_field(), key))
    }
}
