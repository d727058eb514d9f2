//! Identity-shaped data and the read-only [`Identity`] view over it.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Ordered field map, the common shape of resolved identities.
pub type Fields = Map<String, Value>;

/// An identity record owned by an external store (an ORM entity, a directory entry).
pub trait Record: fmt::Debug + Send + Sync {
    fn get(&self, field: &str) -> Option<Value>;

    /// Snapshot of every visible field, used when the identity is persisted.
    fn to_fields(&self) -> Fields;

    fn is_empty(&self) -> bool {
        self.to_fields().is_empty()
    }
}

/// Resolved identity data: either a plain field map or an opaque external record.
#[derive(Clone, Debug)]
pub enum IdentityData {
    Fields(Fields),
    Record(Arc<dyn Record>),
}

impl IdentityData {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        match self {
            Self::Fields(fields) => fields.get(field).cloned(),
            Self::Record(record) => record.get(field),
        }
    }

    /// Scalar field rendered as a string; objects, arrays and nulls yield `None`.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(value) => Some(value),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fields(fields) => fields.is_empty(),
            Self::Record(record) => record.is_empty(),
        }
    }

    #[must_use]
    pub fn to_fields(&self) -> Fields {
        match self {
            Self::Fields(fields) => fields.clone(),
            Self::Record(record) => record.to_fields(),
        }
    }

    /// Drop a field; opaque records are wrapped so the field is hidden, not rewritten.
    #[must_use]
    pub fn without(self, field: &str) -> Self {
        match self {
            Self::Fields(mut fields) => {
                fields.shift_remove(field);
                Self::Fields(fields)
            }
            Self::Record(record) => Self::Record(Arc::new(Masked::new(record, field))),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Fields(fields) => Value::Object(fields),
            Self::Record(record) => Value::Object(record.to_fields()),
        }
    }

    /// Wrap stored data so field access is uniform.
    ///
    /// Objects become field maps, arrays are keyed by index, a bare scalar is
    /// taken as the identity's `id`. `null` is no identity at all.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let fields = match value {
            Value::Null => return None,
            Value::Object(fields) => fields,
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            scalar => {
                let mut fields = Fields::new();
                fields.insert("id".to_string(), scalar);
                fields
            }
        };
        Some(Self::Fields(fields))
    }
}

impl From<Fields> for IdentityData {
    fn from(fields: Fields) -> Self {
        Self::Fields(fields)
    }
}

impl PartialEq for IdentityData {
    fn eq(&self, other: &Self) -> bool {
        self.to_fields() == other.to_fields()
    }
}

#[derive(Debug)]
struct Masked {
    inner: Arc<dyn Record>,
    hidden: BTreeSet<String>,
}

impl Masked {
    fn new(inner: Arc<dyn Record>, field: &str) -> Self {
        Self {
            inner,
            hidden: BTreeSet::from([field.to_string()]),
        }
    }
}

impl Record for Masked {
    fn get(&self, field: &str) -> Option<Value> {
        if self.hidden.contains(field) {
            None
        } else {
            self.inner.get(field)
        }
    }

    fn to_fields(&self) -> Fields {
        let mut fields = self.inner.to_fields();
        fields.retain(|key, _| !self.hidden.contains(key));
        fields
    }
}

/// Read-only, field-renaming view over resolved identity data.
///
/// There is no way to write through an `Identity`; the wrapped data is only
/// reachable by shared reference.
#[derive(Clone, Debug)]
pub struct Identity {
    data: IdentityData,
    field_map: BTreeMap<String, String>,
}

impl Identity {
    #[must_use]
    pub fn new(data: IdentityData) -> Self {
        Self::with_field_map(data, default_field_map())
    }

    #[must_use]
    pub fn with_field_map(data: IdentityData, field_map: BTreeMap<String, String>) -> Self {
        Self { data, field_map }
    }

    /// Shorthand for `get("id")`.
    #[must_use]
    pub fn identifier(&self) -> Option<Value> {
        self.get("id")
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        let field = self.field_map.get(field).map_or(field, String::as_str);
        self.data.get(field)
    }

    #[must_use]
    pub fn original_data(&self) -> &IdentityData {
        &self.data
    }

    #[must_use]
    pub fn field_map(&self) -> &BTreeMap<String, String> {
        &self.field_map
    }
}

impl From<IdentityData> for Identity {
    fn from(data: IdentityData) -> Self {
        Self::new(data)
    }
}

#[must_use]
pub fn default_field_map() -> BTreeMap<String, String> {
    BTreeMap::from([("id".to_string(), "id".to_string())])
}
