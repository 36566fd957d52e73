// used to print out readable forms of values and conditions
use std::collections::BTreeMap;
use std::fmt;

use crate::store::Key;

/// A field value on a host record or in a filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Text(String),
}
impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

// ------------- Condition -------------
/// One `field = value` filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    field: String,
    value: Value,
}
impl Condition {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
    pub fn field(&self) -> &str {
        &self.field
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
    /// An unset field counts as null.
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == &self.value
    }
}
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}

/// Shorthand for building a condition set from `(field, value)` pairs.
pub fn conditions<I, F, V>(pairs: I) -> Vec<Condition>
where
    I: IntoIterator<Item = (F, V)>,
    F: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(field, value)| Condition::new(field, value))
        .collect()
}

// ------------- Record -------------
pub type RecordId = u64;

/// A host record as the query layer sees it: storage fields only. Lookup
/// attributes live here as their key field, never as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    id: Option<RecordId>,
    fields: BTreeMap<String, Value>,
}
impl Record {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }
    pub fn get(&self, field: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.fields.get(field).unwrap_or(NULL)
    }
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        match value.into() {
            Value::Null => {
                self.fields.remove(field);
            }
            value => {
                self.fields.insert(field.to_string(), value);
            }
        }
    }
    pub(crate) fn key(&self, field: &str) -> Option<Key> {
        self.get(field).as_integer()
    }
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }
}
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(field, value)| format!("{}: {}", field, value))
            .collect();
        match self.id {
            Some(id) => write!(f, "#{} {{{}}}", id, fields.join(", ")),
            None => write!(f, "new {{{}}}", fields.join(", ")),
        }
    }
}
