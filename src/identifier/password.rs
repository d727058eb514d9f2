use super::{Identification, Identifier};
use crate::config::StringList;
use crate::credentials::{Credentials, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::error::Error;
use crate::hasher::PasswordHasher;
use crate::resolver::{Combinator, Conditions, Resolver};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PasswordFields {
    /// One or more record fields the username may match.
    pub username: StringList,
    pub password: String,
}

impl Default for PasswordFields {
    fn default() -> Self {
        Self {
            username: StringList::from(CREDENTIAL_USERNAME),
            password: CREDENTIAL_PASSWORD.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PasswordIdentifierConfig {
    pub fields: PasswordFields,
}

/// Looks a user up by username and checks the supplied password.
#[derive(Debug)]
pub struct PasswordIdentifier {
    username_fields: Vec<String>,
    password_field: String,
    resolver: Arc<dyn Resolver>,
    hasher: Arc<dyn PasswordHasher>,
}

impl PasswordIdentifier {
    #[must_use]
    pub fn new(
        config: PasswordIdentifierConfig,
        resolver: Arc<dyn Resolver>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            username_fields: config.fields.username.to_vec(),
            password_field: config.fields.password,
            resolver,
            hasher,
        }
    }

    fn username<'a>(&self, credentials: &'a Credentials) -> Option<&'a str> {
        credentials.non_empty(CREDENTIAL_USERNAME).or_else(|| {
            self.username_fields
                .iter()
                .find_map(|field| credentials.non_empty(field))
        })
    }
}

impl Identifier for PasswordIdentifier {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        let Some(username) = self.username(credentials) else {
            return Ok(Identification::not_found());
        };

        let conditions: Conditions = self
            .username_fields
            .iter()
            .map(|field| (field.clone(), username.to_string()))
            .collect();
        let record = self
            .resolver
            .find(&conditions, Combinator::Or)
            .map_err(Error::Backend)?;

        let Some(password) = credentials.get(CREDENTIAL_PASSWORD) else {
            return Ok(record.map_or_else(Identification::not_found, Identification::found));
        };

        let digest = record
            .as_ref()
            .and_then(|record| record.get_str(&self.password_field));
        let Some((record, digest)) = record.zip(digest) else {
            // Spend a full check so an unknown user costs the same as a wrong password.
            let _ = self.hasher.check(password, "");
            debug!("password identifier found no matching user");
            return Ok(Identification::not_found());
        };

        if !self.hasher.check(password, &digest) {
            debug!("password identifier rejected the supplied password");
            return Ok(Identification::not_found());
        }
        let needs_rehash = self.hasher.needs_rehash(&digest);
        Ok(Identification::found(record.without(&self.password_field))
            .with_needs_rehash(needs_rehash))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hasher::Argon2Hasher;
    use crate::identity::Fields;
    use crate::resolver::MemoryResolver;
    use argon2::Params;
    use serde_json::{json, Value};

    fn hasher() -> Arc<Argon2Hasher> {
        Arc::new(Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap()))
    }

    fn record(value: Value) -> Fields {
        match value {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        }
    }

    fn identifier(config: PasswordIdentifierConfig) -> PasswordIdentifier {
        let hasher = hasher();
        let digest = hasher.hash("password").unwrap();
        let resolver = MemoryResolver::new(vec![record(json!({
            "id": 1,
            "username": "mariano",
            "email": "mariano@example.com",
            "password": digest,
        }))]);
        PasswordIdentifier::new(config, Arc::new(resolver), hasher)
    }

    #[test]
    fn valid_password_strips_the_digest() {
        let identifier = identifier(PasswordIdentifierConfig::default());
        let credentials = Credentials::new()
            .with("username", "mariano")
            .with("password", "password");
        let identification = identifier.identify(&credentials).unwrap();
        let identity = identification.identity().unwrap();
        assert_eq!(identity.get("id"), Some(json!(1)));
        assert!(!identity.contains("password"));
        assert!(!identification.needs_password_rehash());
    }

    #[test]
    fn wrong_password_or_unknown_user_is_a_miss() {
        let identifier = identifier(PasswordIdentifierConfig::default());
        let wrong = Credentials::new()
            .with("username", "mariano")
            .with("password", "nope");
        assert!(!identifier.identify(&wrong).unwrap().is_found());
        let unknown = Credentials::new()
            .with("username", "larry")
            .with("password", "password");
        assert!(!identifier.identify(&unknown).unwrap().is_found());
    }

    #[test]
    fn username_may_match_several_fields() {
        let config = PasswordIdentifierConfig {
            fields: PasswordFields {
                username: StringList::Many(vec!["username".into(), "email".into()]),
                password: "password".into(),
            },
        };
        let identifier = identifier(config);
        let credentials = Credentials::new()
            .with("username", "mariano@example.com")
            .with("password", "password");
        assert!(identifier.identify(&credentials).unwrap().is_found());
    }

    #[test]
    fn missing_password_returns_the_record() {
        let identifier = identifier(PasswordIdentifierConfig::default());
        let credentials = Credentials::new().with("username", "mariano");
        let identification = identifier.identify(&credentials).unwrap();
        assert!(identification
            .identity()
            .is_some_and(|identity| identity.contains("password")));
    }

    #[test]
    fn missing_username_never_queries() {
        let identifier = identifier(PasswordIdentifierConfig::default());
        let credentials = Credentials::new().with("password", "password");
        assert!(!identifier.identify(&credentials).unwrap().is_found());
    }
}
