use super::{credentials_missing, identify, Authenticator};
use crate::config::StringList;
use crate::credentials::Credentials;
use crate::error::{ConfigError, Error};
use crate::http::Request;
use crate::identifier::Identifier;
use crate::result::{AuthResult, Status};
use crate::url_matcher::{UrlMatcher, UrlMatcherConfig};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EnvironmentAuthenticatorConfig {
    /// Server parameters that must all be present and non-empty.
    pub fields: Vec<String>,
    /// Server parameters forwarded when present.
    pub optional_fields: Vec<String>,
    pub login_url: StringList,
    pub url_checker: UrlMatcherConfig,
}

/// Credentials injected by the front server, e.g. SSO or client certificate variables.
#[derive(Debug)]
pub struct EnvironmentAuthenticator {
    fields: Vec<String>,
    optional_fields: Vec<String>,
    login_url: UrlMatcher,
    identifier: Arc<dyn Identifier>,
}

impl EnvironmentAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no required field is configured or a
    /// login URL pattern does not compile.
    pub fn new(
        config: EnvironmentAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        if config.fields.is_empty() {
            return Err(ConfigError::Missing {
                component: "Environment",
                key: "fields",
            });
        }
        Ok(Self {
            login_url: UrlMatcher::new(config.login_url.to_vec(), &config.url_checker)?,
            fields: config.fields,
            optional_fields: config.optional_fields,
            identifier,
        })
    }

    fn credentials(&self, request: &Request) -> Option<Credentials> {
        let mut credentials = self
            .fields
            .iter()
            .map(|field| {
                request
                    .server_param(field)
                    .filter(|value| !value.is_empty())
                    .map(|value| (field.clone(), value.to_string()))
            })
            .collect::<Option<Credentials>>()?;
        for field in &self.optional_fields {
            if let Some(value) = request.server_param(field) {
                credentials.insert(field.as_str(), value);
            }
        }
        Some(credentials)
    }
}

impl Authenticator for EnvironmentAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        if !self.login_url.matches(request) {
            debug!(path = %request.path(), "environment login url did not match");
            return Ok(AuthResult::failure(
                Status::Other,
                vec![self.login_url.mismatch_message(request)],
            ));
        }
        let Some(credentials) = self.credentials(request) else {
            return Ok(credentials_missing("Environment credentials not found"));
        };
        identify(self.identifier.as_ref(), &credentials)
    }
}
