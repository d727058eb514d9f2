use super::{Identification, Identifier};
use crate::credentials::{Credentials, CREDENTIAL_JWT_SUBJECT, CREDENTIAL_TOKEN};
use crate::error::{ConfigError, Error};
use crate::resolver::{Combinator, Resolver};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TokenIdentifierConfig {
    /// Record field holding the token.
    pub token_field: String,
    /// Credential key the token is read from.
    pub data_field: String,
    /// Hash applied to the presented token before the lookup (`sha256`).
    pub hash_algorithm: Option<String>,
}

impl Default for TokenIdentifierConfig {
    fn default() -> Self {
        Self {
            token_field: CREDENTIAL_TOKEN.to_string(),
            data_field: CREDENTIAL_TOKEN.to_string(),
            hash_algorithm: None,
        }
    }
}

/// Token identifier preset resolving a decoded JWT subject to a record id.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct JwtSubjectIdentifierConfig {
    pub token_field: String,
    pub data_field: String,
}

impl Default for JwtSubjectIdentifierConfig {
    fn default() -> Self {
        Self {
            token_field: "id".to_string(),
            data_field: CREDENTIAL_JWT_SUBJECT.to_string(),
        }
    }
}

impl From<JwtSubjectIdentifierConfig> for TokenIdentifierConfig {
    fn from(config: JwtSubjectIdentifierConfig) -> Self {
        Self {
            token_field: config.token_field,
            data_field: config.data_field,
            hash_algorithm: None,
        }
    }
}

#[derive(Debug)]
pub struct TokenIdentifier {
    token_field: String,
    data_field: String,
    hash: bool,
    resolver: Arc<dyn Resolver>,
}

impl TokenIdentifier {
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for hash algorithms other than `sha256`.
    pub fn new(
        config: TokenIdentifierConfig,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, ConfigError> {
        let hash = match config.hash_algorithm.as_deref() {
            None => false,
            Some(algorithm) if algorithm.eq_ignore_ascii_case("sha256") => true,
            Some(other) => {
                return Err(ConfigError::Unsupported {
                    component: "Token",
                    key: "hashAlgorithm",
                    value: other.to_string(),
                })
            }
        };
        Ok(Self {
            token_field: config.token_field,
            data_field: config.data_field,
            hash,
            resolver,
        })
    }
}

/// Hex SHA-256 of a presented token, as stored by the token field.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

impl Identifier for TokenIdentifier {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        let Some(token) = credentials.non_empty(&self.data_field) else {
            return Ok(Identification::not_found());
        };
        let token = if self.hash {
            hash_token(token)
        } else {
            token.to_string()
        };
        let conditions = vec![(self.token_field.clone(), token)];
        let record = self
            .resolver
            .find(&conditions, Combinator::And)
            .map_err(Error::Backend)?;
        Ok(record.map_or_else(Identification::not_found, Identification::found))
    }
}
