use crate::error::BoxError;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Server-side session store bound to one request.
pub trait Session: fmt::Debug + Send + Sync {
    fn read(&self, key: &str) -> Option<Value>;

    /// # Errors
    ///
    /// Returns an error when the backing store rejects the write.
    fn write(&self, key: &str, value: Value) -> Result<(), BoxError>;

    /// # Errors
    ///
    /// Returns an error when the backing store rejects the delete.
    fn delete(&self, key: &str) -> Result<(), BoxError>;

    fn check(&self, key: &str) -> bool;

    /// Rotate the session id, keeping the stored values.
    ///
    /// # Errors
    ///
    /// Returns an error when a new id can not be issued.
    fn renew(&self) -> Result<(), BoxError>;

    fn id(&self) -> String;
}

#[derive(Debug)]
struct State {
    id: String,
    values: BTreeMap<String, Value>,
}

/// Process-local session, useful for tests and single-node deployments.
#[derive(Debug)]
pub struct MemorySession {
    state: Mutex<State>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::with_id(generate_session_id())
    }
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                id: id.into(),
                values: BTreeMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Session for MemorySession {
    fn read(&self, key: &str) -> Option<Value> {
        self.state().values.get(key).cloned()
    }

    fn write(&self, key: &str, value: Value) -> Result<(), BoxError> {
        self.state().values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BoxError> {
        self.state().values.remove(key);
        Ok(())
    }

    fn check(&self, key: &str) -> bool {
        self.state()
            .values
            .get(key)
            .is_some_and(|value| !value.is_null())
    }

    fn renew(&self) -> Result<(), BoxError> {
        self.state().id = generate_session_id();
        Ok(())
    }

    fn id(&self) -> String {
        self.state().id.clone()
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stores_values_and_renews_id() -> Result<(), BoxError> {
        let session = MemorySession::with_id("fixed");
        assert!(!session.check("Auth"));

        session.write("Auth", json!({"id": 1}))?;
        assert!(session.check("Auth"));
        assert_eq!(session.read("Auth"), Some(json!({"id": 1})));

        session.renew()?;
        assert_ne!(session.id(), "fixed");
        assert_eq!(session.read("Auth"), Some(json!({"id": 1})));

        session.delete("Auth")?;
        assert!(!session.check("Auth"));
        Ok(())
    }

    #[test]
    fn generated_ids_are_url_safe() {
        let id = MemorySession::new().id();
        assert_eq!(id.len(), 43);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
