//! Directory (LDAP) bind primitive consumed by the LDAP identifier.

use crate::error::BoxError;
use serde_json::{Map, Value};
use std::fmt;

/// Connection options passed verbatim to the adapter.
pub type DirectoryOptions = Map<String, Value>;

pub trait DirectoryAdapter: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the server can not be reached.
    fn connect(&self, host: &str, port: u16, options: &DirectoryOptions) -> Result<(), BoxError>;

    /// Attempt a simple bind; `Ok(false)` means the credentials were rejected.
    ///
    /// # Errors
    ///
    /// Returns an error when the bind could not be attempted.
    fn bind(&self, dn: &str, password: &str) -> Result<bool, BoxError>;

    fn unbind(&self);

    /// Extended diagnostic from the last failed operation, if the server sent one.
    fn diagnostic_message(&self) -> Option<String>;
}
