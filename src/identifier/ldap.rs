use super::{Identification, Identifier};
use crate::credentials::{Credentials, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::directory::{DirectoryAdapter, DirectoryOptions};
use crate::error::{ConfigError, Error};
use crate::identity::{Fields, IdentityData};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Computes the bind DN from `(username, domain)`.
pub type BindDnCallback = Arc<dyn Fn(&str, Option<&str>) -> String + Send + Sync>;

/// Bind DN as configured: a `{username}`/`{domain}` template or a registered callback.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BindDnConfig {
    Template(String),
    Callback { callback: String },
}

impl Default for BindDnConfig {
    fn default() -> Self {
        Self::Template("{username}".to_string())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LdapFields {
    pub username: String,
    pub password: String,
}

impl Default for LdapFields {
    fn default() -> Self {
        Self {
            username: CREDENTIAL_USERNAME.to_string(),
            password: CREDENTIAL_PASSWORD.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LdapIdentifierConfig {
    pub host: Option<String>,
    pub port: u16,
    pub bind_dn: BindDnConfig,
    pub domain: Option<String>,
    pub fields: LdapFields,
    pub options: DirectoryOptions,
}

impl Default for LdapIdentifierConfig {
    fn default() -> Self {
        let mut options = DirectoryOptions::new();
        options.insert("networkTimeout".to_string(), Value::from(5));
        Self {
            host: None,
            port: 389,
            bind_dn: BindDnConfig::default(),
            domain: None,
            fields: LdapFields::default(),
            options,
        }
    }
}

/// Resolved bind DN strategy.
#[derive(Clone)]
pub enum BindDn {
    Template(String),
    Callback(BindDnCallback),
}

impl BindDn {
    fn render(&self, username: &str, domain: Option<&str>) -> String {
        match self {
            Self::Template(template) => template
                .replace("{username}", username)
                .replace("{domain}", domain.unwrap_or_default()),
            Self::Callback(callback) => callback(username, domain),
        }
    }
}

impl fmt::Debug for BindDn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Authenticates by binding to a directory server as the user.
#[derive(Debug)]
pub struct LdapIdentifier {
    bind_dn: BindDn,
    domain: Option<String>,
    fields: LdapFields,
    adapter: Arc<dyn DirectoryAdapter>,
}

impl LdapIdentifier {
    /// Connects right away; a directory that can not be reached is a deployment error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without a host and
    /// [`ConfigError::Connect`] when the adapter can not connect.
    pub fn new(
        config: LdapIdentifierConfig,
        bind_dn: BindDn,
        adapter: Arc<dyn DirectoryAdapter>,
    ) -> Result<Self, ConfigError> {
        let host = config
            .host
            .filter(|host| !host.is_empty())
            .ok_or(ConfigError::Missing {
                component: "Ldap",
                key: "host",
            })?;
        adapter
            .connect(&host, config.port, &config.options)
            .map_err(|source| ConfigError::Connect {
                host: host.clone(),
                source,
            })?;
        debug!(host = %host, port = config.port, "connected to directory server");
        Ok(Self {
            bind_dn,
            domain: config.domain,
            fields: config.fields,
            adapter,
        })
    }
}

impl Identifier for LdapIdentifier {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        let (Some(username), Some(password)) = (
            credentials.non_empty(&self.fields.username),
            credentials.non_empty(&self.fields.password),
        ) else {
            return Ok(Identification::not_found());
        };

        let dn = self.bind_dn.render(username, self.domain.as_deref());
        let identification = match self.adapter.bind(&dn, password) {
            Ok(true) => {
                let mut fields = Fields::new();
                fields.insert(self.fields.username.clone(), Value::from(username));
                Identification::found(IdentityData::Fields(fields))
            }
            Ok(false) => Identification::not_found(),
            Err(err) => {
                warn!("directory bind failed: {err}");
                let mut errors: Vec<String> = self.adapter.diagnostic_message().into_iter().collect();
                errors.push(err.to_string());
                Identification::not_found().with_errors(errors)
            }
        };
        self.adapter.unbind();
        Ok(identification)
    }
}
