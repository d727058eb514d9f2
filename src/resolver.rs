//! Identity lookup seam used by the password, token and verification identifiers.

use crate::error::BoxError;
use crate::identity::{Fields, IdentityData};
use serde_json::Value;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// How the equality conditions of a lookup are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// Ordered `field = value` equality conditions.
pub type Conditions = Vec<(String, String)>;

pub trait Resolver: fmt::Debug + Send + Sync {
    /// Find the first record satisfying `conditions`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store can not be queried.
    fn find(
        &self,
        conditions: &Conditions,
        combinator: Combinator,
    ) -> Result<Option<IdentityData>, BoxError>;
}

/// In-process resolver over an ordered list of field maps.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    records: Mutex<Vec<Fields>>,
}

impl MemoryResolver {
    #[must_use]
    pub fn new(records: Vec<Fields>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn insert(&self, record: Fields) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Replace the first record whose `key` field equals `value`.
    pub fn update(&self, key: &str, value: &Value, record: Fields) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.iter_mut().find(|r| r.get(key) == Some(value)) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }
}

fn field_equals(record: &Fields, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(value)) => value == expected,
        Some(Value::Number(value)) => value.to_string() == expected,
        Some(Value::Bool(value)) => value.to_string() == expected,
        _ => false,
    }
}

impl Resolver for MemoryResolver {
    fn find(
        &self,
        conditions: &Conditions,
        combinator: Combinator,
    ) -> Result<Option<IdentityData>, BoxError> {
        if conditions.is_empty() {
            return Ok(None);
        }
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let found = records.iter().find(|record| {
            let mut matches = conditions
                .iter()
                .map(|(field, value)| field_equals(record, field, value));
            match combinator {
                Combinator::And => matches.all(|m| m),
                Combinator::Or => matches.any(|m| m),
            }
        });
        Ok(found.cloned().map(IdentityData::Fields))
    }
}
