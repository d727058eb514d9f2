//! The orchestrator: runs authenticators in order and fans persistence out.

use crate::authenticator::{Authenticator, AuthenticatorCollection, Impersonation};
use crate::error::{ConfigError, Error};
use crate::http::{Attribute, Request, Response};
use crate::identifier::IdentifierCollection;
use crate::identity::{default_field_map, Identity, IdentityData};
use crate::registry::{AuthenticatorFactory, IdentifierFactory, Registry};
use crate::result::AuthResult;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "identity";

/// One entry of the ordered identifier or authenticator list.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentConfig {
    /// Registered component name, e.g. `Password` or `HttpBasic`.
    pub name: String,
    /// Defaults to `name`.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub config: Value,
}

impl ComponentConfig {
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn load_config(&self) -> Value {
        if self.alias.is_none() {
            return self.config.clone();
        }
        let mut config = match &self.config {
            Value::Object(config) => config.clone(),
            _ => serde_json::Map::new(),
        };
        config.insert("className".to_string(), Value::from(self.name.clone()));
        Value::Object(config)
    }
}

/// A whole service described as data.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServiceConfig {
    pub identifiers: Vec<ComponentConfig>,
    pub authenticators: Vec<ComponentConfig>,
    pub identity_attribute: String,
    pub identity_field_map: BTreeMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            identifiers: Vec::new(),
            authenticators: Vec::new(),
            identity_attribute: DEFAULT_IDENTITY_ATTRIBUTE.to_string(),
            identity_field_map: default_field_map(),
        }
    }
}

impl ServiceConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the JSON does not describe a service.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Invalid {
            component: "Service".to_string(),
            source,
        })
    }
}

/// Request-scoped authentication state.
#[derive(Debug)]
pub struct AuthenticationService {
    authenticators: AuthenticatorCollection,
    identity_attribute: String,
    field_map: BTreeMap<String, String>,
    result: Option<AuthResult>,
    successful: Option<String>,
    identification_provider: Option<String>,
}

impl AuthenticationService {
    #[must_use]
    pub fn new(authenticators: AuthenticatorCollection) -> Self {
        Self {
            authenticators,
            identity_attribute: DEFAULT_IDENTITY_ATTRIBUTE.to_string(),
            field_map: default_field_map(),
            result: None,
            successful: None,
            identification_provider: None,
        }
    }

    /// Build every component listed in `config`, in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised while loading a component.
    pub fn from_config(registry: &Registry, config: &ServiceConfig) -> Result<Self, ConfigError> {
        let mut identifiers = IdentifierCollection::new();
        for component in &config.identifiers {
            identifiers.load(registry, component.alias(), component.load_config())?;
        }
        let mut authenticators = AuthenticatorCollection::new(Arc::new(identifiers));
        for component in &config.authenticators {
            authenticators.load(registry, component.alias(), component.load_config())?;
        }
        Ok(Self::new(authenticators)
            .with_identity_attribute(config.identity_attribute.clone())
            .with_field_map(config.identity_field_map.clone()))
    }

    #[must_use]
    pub fn with_identity_attribute(mut self, name: impl Into<String>) -> Self {
        self.identity_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_field_map(mut self, field_map: BTreeMap<String, String>) -> Self {
        self.field_map = field_map;
        self
    }

    /// Try each authenticator in order until one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoAuthenticators`] when nothing is loaded,
    /// [`Error::Challenge`] when a failed stateless authenticator challenges
    /// the client, and collaborator failures.
    pub fn authenticate(&mut self, request: &Request) -> Result<AuthResult, Error> {
        if self.authenticators.is_empty() {
            return Err(ConfigError::NoAuthenticators.into());
        }

        let mut last = None;
        for (alias, authenticator) in self.authenticators.iter() {
            let result = authenticator.authenticate(request)?;
            if result.is_valid() {
                debug!(authenticator = %alias, "authenticated");
                self.successful = Some(alias.to_string());
                self.identification_provider =
                    self.authenticators.identifiers().successful_identifier();
                self.result = Some(result.clone());
                return Ok(result);
            }
            debug!(authenticator = %alias, status = %result.status(), "authenticator did not match");
            if let Some(stateless) = authenticator.as_stateless() {
                self.result = Some(result.clone());
                self.successful = None;
                stateless.unauthorized_challenge(request).inspect_err(|err| {
                    if err.is_challenge() {
                        info!(authenticator = %alias, "challenge issued");
                    }
                })?;
            }
            last = Some(result);
        }

        self.successful = None;
        self.identification_provider = None;
        self.result.clone_from(&last);
        last.ok_or_else(|| ConfigError::NoAuthenticators.into())
    }

    /// Hand the identity to every persistence-capable authenticator, then
    /// attach it to the request.
    ///
    /// # Errors
    ///
    /// Returns the first error a persistence store reports.
    pub fn persist_identity(
        &self,
        request: Request,
        response: Response,
        identity: IdentityData,
    ) -> Result<(Request, Response), Error> {
        let (mut request, mut response) = (request, response);
        for (alias, authenticator) in self.authenticators.iter() {
            if let Some(persistence) = authenticator.as_persistence() {
                debug!(authenticator = %alias, "persisting identity");
                (request, response) = persistence.persist_identity(request, response, &identity)?;
            }
        }
        let identity = Identity::with_field_map(identity, self.field_map.clone());
        Ok((
            request.with_attribute(self.identity_attribute.clone(), Attribute::Identity(identity)),
            response,
        ))
    }

    /// # Errors
    ///
    /// Returns the first error a persistence store reports.
    pub fn clear_identity(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error> {
        let (mut request, mut response) = (request, response);
        for (alias, authenticator) in self.authenticators.iter() {
            if let Some(persistence) = authenticator.as_persistence() {
                debug!(authenticator = %alias, "clearing identity");
                (request, response) = persistence.clear_identity(request, response)?;
            }
        }
        Ok((request.without_attribute(&self.identity_attribute), response))
    }

    /// Identity of the last valid result.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.result
            .as_ref()
            .filter(|result| result.is_valid())
            .and_then(AuthResult::data)
            .map(|data| Identity::with_field_map(data.clone(), self.field_map.clone()))
    }

    #[must_use]
    pub fn result(&self) -> Option<&AuthResult> {
        self.result.as_ref()
    }

    /// Alias of the authenticator behind the last valid result.
    #[must_use]
    pub fn authentication_provider(&self) -> Option<&str> {
        self.successful.as_deref()
    }

    /// Alias of the identifier that resolved the last valid result, if one did.
    #[must_use]
    pub fn identification_provider(&self) -> Option<&str> {
        self.identification_provider.as_deref()
    }

    #[must_use]
    pub fn identity_attribute(&self) -> &str {
        &self.identity_attribute
    }

    #[must_use]
    pub fn identifiers(&self) -> &Arc<IdentifierCollection> {
        self.authenticators.identifiers()
    }

    #[must_use]
    pub fn authenticators(&self) -> &AuthenticatorCollection {
        &self.authenticators
    }

    fn impersonation_provider(&self) -> Result<(&str, &dyn Impersonation), Error> {
        let alias = self.successful.as_deref().ok_or(ConfigError::NoProvider)?;
        let authenticator: &Arc<dyn Authenticator> = self
            .authenticators
            .get(alias)
            .ok_or(ConfigError::NoProvider)?;
        let provider = authenticator
            .as_impersonation()
            .ok_or_else(|| ConfigError::NotImpersonationCapable(alias.to_string()))?;
        Ok((alias, provider))
    }

    /// Act as `impersonated` while remembering the current identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProvider`] before a successful authentication,
    /// [`ConfigError::NotImpersonationCapable`] when the matching
    /// authenticator can not impersonate, and [`Error::AlreadyImpersonating`].
    pub fn impersonate(
        &self,
        request: Request,
        response: Response,
        impersonated: &IdentityData,
    ) -> Result<(Request, Response), Error> {
        let (alias, provider) = self.impersonation_provider()?;
        let impersonator = self
            .result
            .as_ref()
            .and_then(AuthResult::data)
            .ok_or(ConfigError::NoProvider)?;
        info!(authenticator = %alias, "impersonating");
        provider.impersonate(request, response, impersonator, impersonated)
    }

    /// # Errors
    ///
    /// Same provider errors as [`AuthenticationService::impersonate`].
    pub fn stop_impersonating(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error> {
        let (_, provider) = self.impersonation_provider()?;
        provider.stop_impersonating(request, response)
    }

    /// # Errors
    ///
    /// Same provider errors as [`AuthenticationService::impersonate`].
    pub fn is_impersonating(&self, request: &Request) -> Result<bool, Error> {
        let (_, provider) = self.impersonation_provider()?;
        Ok(provider.is_impersonating(request))
    }
}

/// Fluent service assembly; components are built in [`ServiceBuilder::build`].
pub struct ServiceBuilder {
    registry: Registry,
    identifiers: Vec<ComponentConfig>,
    authenticators: Vec<ComponentConfig>,
    identity_attribute: String,
    field_map: BTreeMap<String, String>,
}

impl ServiceBuilder {
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        Self {
            registry: registry.clone(),
            identifiers: Vec::new(),
            authenticators: Vec::new(),
            identity_attribute: DEFAULT_IDENTITY_ATTRIBUTE.to_string(),
            field_map: default_field_map(),
        }
    }

    /// Queue an identifier; `alias` doubles as the component name unless the
    /// config carries `className`.
    #[must_use]
    pub fn identifier(mut self, alias: impl Into<String>, config: Value) -> Self {
        self.identifiers.push(ComponentConfig {
            name: alias.into(),
            alias: None,
            config,
        });
        self
    }

    #[must_use]
    pub fn authenticator(mut self, alias: impl Into<String>, config: Value) -> Self {
        self.authenticators.push(ComponentConfig {
            name: alias.into(),
            alias: None,
            config,
        });
        self
    }

    #[must_use]
    pub fn register_identifier(mut self, name: impl Into<String>, factory: IdentifierFactory) -> Self {
        self.registry.register_identifier(name, factory);
        self
    }

    #[must_use]
    pub fn register_authenticator(
        mut self,
        name: impl Into<String>,
        factory: AuthenticatorFactory,
    ) -> Self {
        self.registry.register_authenticator(name, factory);
        self
    }

    #[must_use]
    pub fn identity_attribute(mut self, name: impl Into<String>) -> Self {
        self.identity_attribute = name.into();
        self
    }

    #[must_use]
    pub fn field_map(mut self, field_map: BTreeMap<String, String>) -> Self {
        self.field_map = field_map;
        self
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised while loading a component.
    pub fn build(self) -> Result<AuthenticationService, ConfigError> {
        let config = ServiceConfig {
            identifiers: self.identifiers,
            authenticators: self.authenticators,
            identity_attribute: self.identity_attribute,
            identity_field_map: self.field_map,
        };
        AuthenticationService::from_config(&self.registry, &config)
    }
}
