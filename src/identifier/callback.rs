use super::{Identification, Identifier};
use crate::credentials::Credentials;
use crate::error::{BoxError, Error};
use crate::identity::IdentityData;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// User supplied identification function, registered by name.
pub type IdentifyCallback = Arc<dyn Fn(&Credentials) -> Result<Value, BoxError> + Send + Sync>;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CallbackIdentifierConfig {
    /// Name the callback was registered under.
    pub callback: Option<String>,
}

/// Delegates identification to a registered callback.
///
/// The callback returns `null` (or an empty object) for a miss and a JSON
/// object for a hit; anything else breaks the contract.
pub struct CallbackIdentifier {
    name: String,
    callback: IdentifyCallback,
}

impl CallbackIdentifier {
    #[must_use]
    pub fn new(name: impl Into<String>, callback: IdentifyCallback) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl fmt::Debug for CallbackIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackIdentifier")
            .field("callback", &self.name)
            .finish_non_exhaustive()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Identifier for CallbackIdentifier {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        match (self.callback)(credentials).map_err(Error::Backend)? {
            Value::Null => Ok(Identification::not_found()),
            Value::Object(fields) if fields.is_empty() => Ok(Identification::not_found()),
            Value::Object(fields) => Ok(Identification::found(IdentityData::Fields(fields))),
            other => Err(Error::InvalidCallbackReturn {
                callback: self.name.clone(),
                found: kind(&other),
            }),
        }
    }
}
