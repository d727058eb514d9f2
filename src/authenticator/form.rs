use super::{credentials_missing, identify, Authenticator};
use crate::config::{string_pairs, StringList};
use crate::credentials::{Credentials, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::error::{ConfigError, Error};
use crate::http::Request;
use crate::identifier::Identifier;
use crate::result::{AuthResult, Status};
use crate::url_matcher::{UrlMatcher, UrlMatcherConfig};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub(crate) fn default_login_fields() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(CREDENTIAL_USERNAME.into(), CREDENTIAL_USERNAME.into());
    fields.insert(CREDENTIAL_PASSWORD.into(), CREDENTIAL_PASSWORD.into());
    fields
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct FormAuthenticatorConfig {
    /// Credential key → body field.
    pub fields: Map<String, Value>,
    pub login_url: StringList,
    pub url_checker: UrlMatcherConfig,
}

impl Default for FormAuthenticatorConfig {
    fn default() -> Self {
        Self {
            fields: default_login_fields(),
            login_url: StringList::default(),
            url_checker: UrlMatcherConfig::default(),
        }
    }
}

/// Username and password posted in the request body.
#[derive(Debug)]
pub struct FormAuthenticator {
    fields: Vec<(String, String)>,
    login_url: UrlMatcher,
    identifier: Arc<dyn Identifier>,
}

impl FormAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-string field names or bad URL patterns.
    pub fn new(
        config: FormAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            fields: string_pairs("Form", "fields", config.fields)?,
            login_url: UrlMatcher::new(config.login_url.to_vec(), &config.url_checker)?,
            identifier,
        })
    }

    fn credentials(&self, request: &Request) -> Option<Credentials> {
        self.fields
            .iter()
            .map(|(key, field)| {
                request
                    .body_str(field)
                    .filter(|value| !value.is_empty())
                    .map(|value| (key.clone(), value.to_string()))
            })
            .collect()
    }
}

impl Authenticator for FormAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        if !self.login_url.matches(request) {
            debug!(path = %request.path(), "form login url did not match");
            return Ok(AuthResult::failure(
                Status::Other,
                vec![self.login_url.mismatch_message(request)],
            ));
        }
        let Some(credentials) = self.credentials(request) else {
            return Ok(credentials_missing("Login credentials not found"));
        };
        identify(self.identifier.as_ref(), &credentials)
    }
}
