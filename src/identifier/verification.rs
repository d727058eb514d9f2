use super::{Identification, Identifier};
use crate::config::string_pairs;
use crate::credentials::Credentials;
use crate::error::{ConfigError, Error};
use crate::resolver::{Combinator, Conditions, Resolver};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct VerificationIdentifierConfig {
    /// Credential key → record field, all of which must match.
    pub fields: Map<String, Value>,
}

/// Re-checks an already known identity against the backing store.
#[derive(Debug)]
pub struct VerificationIdentifier {
    pairs: Vec<(String, String)>,
    resolver: Arc<dyn Resolver>,
}

impl VerificationIdentifier {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no field pair is configured or a record
    /// field is not a string.
    pub fn new(
        config: VerificationIdentifierConfig,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, ConfigError> {
        if config.fields.is_empty() {
            return Err(ConfigError::Missing {
                component: "Verification",
                key: "fields",
            });
        }
        let pairs = string_pairs("Verification", "fields", config.fields)?;
        Ok(Self { pairs, resolver })
    }
}

impl Identifier for VerificationIdentifier {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        let mut conditions = Conditions::with_capacity(self.pairs.len());
        for (input, field) in &self.pairs {
            let Some(value) = credentials.get(input) else {
                return Ok(Identification::not_found());
            };
            conditions.push((field.clone(), value.to_string()));
        }
        let record = self
            .resolver
            .find(&conditions, Combinator::And)
            .map_err(Error::Backend)?;
        Ok(record.map_or_else(Identification::not_found, Identification::found))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        }
    }

    fn identifier() -> VerificationIdentifier {
        let resolver = MemoryResolver::new(vec![object(
            json!({"id": 1, "username": "mariano", "email": "mariano@example.com"}),
        )]);
        VerificationIdentifier::new(
            VerificationIdentifierConfig {
                fields: object(json!({"id": "id", "username": "username"})),
            },
            Arc::new(resolver),
        )
        .unwrap()
    }

    #[test]
    fn every_pair_must_match() {
        let identifier = identifier();
        let hit = Credentials::new().with("id", "1").with("username", "mariano");
        assert!(identifier.identify(&hit).unwrap().is_found());
        let stale = Credentials::new().with("id", "1").with("username", "larry");
        assert!(!identifier.identify(&stale).unwrap().is_found());
    }

    #[test]
    fn missing_input_is_a_miss() {
        let identifier = identifier();
        let partial = Credentials::new().with("id", "1");
        assert!(!identifier.identify(&partial).unwrap().is_found());
    }

    #[test]
    fn fields_are_required() {
        let resolver = Arc::new(MemoryResolver::default());
        assert!(matches!(
            VerificationIdentifier::new(VerificationIdentifierConfig::default(), resolver),
            Err(ConfigError::Missing { .. })
        ));
    }
}
