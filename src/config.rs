//! Shared helpers for the per-component JSON configs.

use crate::error::ConfigError;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A config value given either as one string or as a list of strings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl StringList {
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

impl From<&str> for StringList {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// Validate an ordered `key → field name` object.
///
/// # Errors
///
/// Returns [`ConfigError::Unsupported`] for non-string field names.
pub fn string_pairs(
    component: &'static str,
    key: &'static str,
    map: serde_json::Map<String, Value>,
) -> Result<Vec<(String, String)>, ConfigError> {
    map.into_iter()
        .map(|(name, field)| match field {
            Value::String(field) => Ok((name, field)),
            other => Err(ConfigError::Unsupported {
                component,
                key,
                value: other.to_string(),
            }),
        })
        .collect()
}

/// `deserialize_with` helper keeping secrets out of `Debug` output.
///
/// # Errors
///
/// Fails when the value is not a string.
pub fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SecretString>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.is_empty()).map(SecretString::from))
}

/// Deserialize a component config; `null` means "all defaults".
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the value does not fit `T`, unknown
/// keys included.
pub fn parse<T: DeserializeOwned>(component: &str, config: Value) -> Result<T, ConfigError> {
    let config = if config.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        config
    };
    serde_json::from_value(config).map_err(|source| ConfigError::Invalid {
        component: component.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase", deny_unknown_fields, default)]
    struct Probe {
        login_url: StringList,
    }

    #[test]
    fn accepts_one_or_many() -> Result<(), ConfigError> {
        let one: Probe = parse("Probe", json!({"loginUrl": "/login"}))?;
        assert_eq!(one.login_url.to_vec(), vec!["/login"]);
        let many: Probe = parse("Probe", json!({"loginUrl": ["/a", "/b"]}))?;
        assert_eq!(many.login_url.to_vec(), vec!["/a", "/b"]);
        let none: Probe = parse("Probe", Value::Null)?;
        assert!(none.login_url.to_vec().is_empty());
        Ok(())
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = parse::<Probe>("Probe", json!({"loginURL": "/login"}));
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }
}
