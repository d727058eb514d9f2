//! Name → factory tables used by the collections to build components.
//!
//! Identifiers and authenticators live in separate namespaces; asking one
//! namespace for a name only the other one knows is a capability mismatch.

use crate::authenticator::{
    Authenticator, CookieAuthenticator, EnvironmentAuthenticator, FormAuthenticator,
    HttpBasicAuthenticator, HttpDigestAuthenticator, JwtAuthenticator, PasetoAuthenticator,
    SessionAuthenticator, TokenAuthenticator,
};
use crate::config;
use crate::directory::DirectoryAdapter;
use crate::error::ConfigError;
use crate::hasher::{Argon2Hasher, PasswordHasher};
use crate::identifier::{
    BindDn, BindDnCallback, BindDnConfig, CallbackIdentifier, CallbackIdentifierConfig,
    Identifier, IdentifyCallback, JwtSubjectIdentifierConfig, LdapIdentifier,
    LdapIdentifierConfig, PasswordIdentifier, TokenIdentifier, TokenIdentifierConfig,
    VerificationIdentifier,
};
use crate::resolver::Resolver;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type IdentifierFactory =
    Arc<dyn Fn(Value, &Dependencies) -> Result<Arc<dyn Identifier>, ConfigError> + Send + Sync>;

pub type AuthenticatorFactory = Arc<
    dyn Fn(Value, &Dependencies, Arc<dyn Identifier>) -> Result<Arc<dyn Authenticator>, ConfigError>
        + Send
        + Sync,
>;

/// Collaborators handed to every factory.
#[derive(Clone)]
pub struct Dependencies {
    pub resolver: Option<Arc<dyn Resolver>>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub directory: Option<Arc<dyn DirectoryAdapter>>,
    /// Named functions for the `Callback` identifier.
    pub callbacks: BTreeMap<String, IdentifyCallback>,
    /// Named bind DN functions for the `Ldap` identifier.
    pub bind_dn: BTreeMap<String, BindDnCallback>,
}

impl Default for Dependencies {
    fn default() -> Self {
        Self {
            resolver: None,
            hasher: Arc::new(Argon2Hasher::default()),
            directory: None,
            callbacks: BTreeMap::new(),
            bind_dn: BTreeMap::new(),
        }
    }
}

impl Dependencies {
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryAdapter>) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_callback(mut self, name: impl Into<String>, callback: IdentifyCallback) -> Self {
        self.callbacks.insert(name.into(), callback);
        self
    }

    #[must_use]
    pub fn with_bind_dn(mut self, name: impl Into<String>, callback: BindDnCallback) -> Self {
        self.bind_dn.insert(name.into(), callback);
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no resolver was supplied.
    pub fn resolver(&self, component: &'static str) -> Result<Arc<dyn Resolver>, ConfigError> {
        self.resolver.clone().ok_or(ConfigError::Missing {
            component,
            key: "resolver",
        })
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("resolver", &self.resolver)
            .field("hasher", &self.hasher)
            .field("directory", &self.directory)
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .field("bind_dn", &self.bind_dn.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone)]
pub struct Registry {
    identifiers: BTreeMap<String, IdentifierFactory>,
    authenticators: BTreeMap<String, AuthenticatorFactory>,
    dependencies: Dependencies,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Dependencies::default())
    }
}

impl Registry {
    /// Registry with every built-in component.
    #[must_use]
    pub fn new(dependencies: Dependencies) -> Self {
        let mut registry = Self {
            identifiers: BTreeMap::new(),
            authenticators: BTreeMap::new(),
            dependencies,
        };
        registry.builtin_identifiers();
        registry.builtin_authenticators();
        registry
    }

    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Add or replace an identifier factory.
    pub fn register_identifier(&mut self, name: impl Into<String>, factory: IdentifierFactory) {
        self.identifiers.insert(name.into(), factory);
    }

    /// Add or replace an authenticator factory.
    pub fn register_authenticator(
        &mut self,
        name: impl Into<String>,
        factory: AuthenticatorFactory,
    ) {
        self.authenticators.insert(name.into(), factory);
    }

    pub fn identifier_names(&self) -> impl Iterator<Item = &str> {
        self.identifiers.keys().map(String::as_str)
    }

    pub fn authenticator_names(&self) -> impl Iterator<Item = &str> {
        self.authenticators.keys().map(String::as_str)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::CapabilityMismatch`] when `name` is only an
    /// authenticator, [`ConfigError::ClassNotFound`] when it is unknown, or
    /// whatever the factory rejects.
    pub fn identifier(&self, name: &str, config: Value) -> Result<Arc<dyn Identifier>, ConfigError> {
        let Some(factory) = self.identifiers.get(name) else {
            return Err(Self::not_found("Identifier", name, self.authenticators.contains_key(name)));
        };
        debug!(identifier = %name, "building identifier");
        factory(config, &self.dependencies)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::CapabilityMismatch`] when `name` is only an
    /// identifier, [`ConfigError::ClassNotFound`] when it is unknown, or
    /// whatever the factory rejects.
    pub fn authenticator(
        &self,
        name: &str,
        config: Value,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Arc<dyn Authenticator>, ConfigError> {
        let Some(factory) = self.authenticators.get(name) else {
            return Err(Self::not_found("Authenticator", name, self.identifiers.contains_key(name)));
        };
        debug!(authenticator = %name, "building authenticator");
        factory(config, &self.dependencies, identifier)
    }

    fn not_found(kind: &'static str, name: &str, other_kind: bool) -> ConfigError {
        if other_kind {
            ConfigError::CapabilityMismatch {
                name: name.to_string(),
                expected: kind,
            }
        } else {
            ConfigError::ClassNotFound {
                kind,
                name: name.to_string(),
            }
        }
    }

    fn builtin_identifiers(&mut self) {
        let builtins: [(&str, IdentifierFactory); 6] = [
            ("Password", Arc::new(password_identifier)),
            ("Token", Arc::new(token_identifier)),
            ("JwtSubject", Arc::new(jwt_subject_identifier)),
            ("Callback", Arc::new(callback_identifier)),
            ("Ldap", Arc::new(ldap_identifier)),
            ("Verification", Arc::new(verification_identifier)),
        ];
        for (name, factory) in builtins {
            self.register_identifier(name, factory);
        }
    }

    fn builtin_authenticators(&mut self) {
        let builtins: [(&str, AuthenticatorFactory); 9] = [
            ("Form", Arc::new(form_authenticator)),
            ("Session", Arc::new(session_authenticator)),
            ("Token", Arc::new(token_authenticator)),
            ("Cookie", Arc::new(cookie_authenticator)),
            ("HttpBasic", Arc::new(basic_authenticator)),
            ("HttpDigest", Arc::new(digest_authenticator)),
            ("Jwt", Arc::new(jwt_authenticator)),
            ("Paseto", Arc::new(paseto_authenticator)),
            ("Environment", Arc::new(environment_authenticator)),
        ];
        for (name, factory) in builtins {
            self.register_authenticator(name, factory);
        }
    }
}

type IdentifierResult = Result<Arc<dyn Identifier>, ConfigError>;
type AuthenticatorResult = Result<Arc<dyn Authenticator>, ConfigError>;

fn password_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config = config::parse("Password", config)?;
    let resolver = deps.resolver("Password")?;
    Ok(Arc::new(PasswordIdentifier::new(
        config,
        resolver,
        deps.hasher.clone(),
    )))
}

fn token_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config = config::parse("Token", config)?;
    Ok(Arc::new(TokenIdentifier::new(config, deps.resolver("Token")?)?))
}

fn jwt_subject_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config: JwtSubjectIdentifierConfig = config::parse("JwtSubject", config)?;
    let config: TokenIdentifierConfig = config.into();
    Ok(Arc::new(TokenIdentifier::new(
        config,
        deps.resolver("JwtSubject")?,
    )?))
}

fn callback_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config: CallbackIdentifierConfig = config::parse("Callback", config)?;
    let name = config.callback.ok_or(ConfigError::Missing {
        component: "Callback",
        key: "callback",
    })?;
    let callback = deps
        .callbacks
        .get(&name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownCallback(name.clone()))?;
    Ok(Arc::new(CallbackIdentifier::new(name, callback)))
}

fn ldap_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config: LdapIdentifierConfig = config::parse("Ldap", config)?;
    let adapter = deps.directory.clone().ok_or(ConfigError::Missing {
        component: "Ldap",
        key: "directory",
    })?;
    let bind_dn = match &config.bind_dn {
        BindDnConfig::Template(template) => BindDn::Template(template.clone()),
        BindDnConfig::Callback { callback } => BindDn::Callback(
            deps.bind_dn
                .get(callback)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownCallback(callback.clone()))?,
        ),
    };
    Ok(Arc::new(LdapIdentifier::new(config, bind_dn, adapter)?))
}

fn verification_identifier(config: Value, deps: &Dependencies) -> IdentifierResult {
    let config = config::parse("Verification", config)?;
    Ok(Arc::new(VerificationIdentifier::new(
        config,
        deps.resolver("Verification")?,
    )?))
}

fn form_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Form", config)?;
    Ok(Arc::new(FormAuthenticator::new(config, identifier)?))
}

fn session_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Session", config)?;
    Ok(Arc::new(SessionAuthenticator::new(config, identifier)?))
}

fn token_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Token", config)?;
    Ok(Arc::new(TokenAuthenticator::new(config, identifier)))
}

fn cookie_authenticator(
    config: Value,
    deps: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Cookie", config)?;
    Ok(Arc::new(CookieAuthenticator::new(
        config,
        identifier,
        deps.hasher.clone(),
    )?))
}

fn basic_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("HttpBasic", config)?;
    Ok(Arc::new(HttpBasicAuthenticator::new(config, identifier)))
}

fn digest_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("HttpDigest", config)?;
    Ok(Arc::new(HttpDigestAuthenticator::new(config, identifier)?))
}

fn jwt_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Jwt", config)?;
    Ok(Arc::new(JwtAuthenticator::new(config, identifier)?))
}

fn paseto_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Paseto", config)?;
    Ok(Arc::new(PasetoAuthenticator::new(config, identifier)?))
}

fn environment_authenticator(
    config: Value,
    _: &Dependencies,
    identifier: Arc<dyn Identifier>,
) -> AuthenticatorResult {
    let config = config::parse("Environment", config)?;
    Ok(Arc::new(EnvironmentAuthenticator::new(config, identifier)?))
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("identifiers", &self.identifiers.keys().collect::<Vec<_>>())
            .field("authenticators", &self.authenticators.keys().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Pull the component name out of a config.
///
/// `className` names the type to build and defaults to `alias`; the key is
/// removed so the component config stays strict.
#[must_use]
pub fn split_class_name(alias: &str, config: Value) -> (String, Value) {
    match config {
        Value::Object(mut map) => {
            let class_name = match map.shift_remove("className") {
                Some(Value::String(name)) if !name.is_empty() => name,
                _ => alias.to_string(),
            };
            let config = if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            };
            (class_name, config)
        }
        other => (alias.to_string(), other),
    }
}

/// Config object with only `className` set.
#[must_use]
pub fn class_name(name: &str) -> Value {
    let mut map = Map::new();
    map.insert("className".to_string(), Value::from(name));
    Value::Object(map)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use crate::error::BoxError;
    use crate::identifier::IdentifierCollection;
    use crate::resolver::MemoryResolver;
    use serde_json::json;

    fn resolver() -> Arc<dyn Resolver> {
        Arc::new(MemoryResolver::default())
    }

    #[test]
    fn class_name_defaults_to_alias() {
        let (name, config) = split_class_name("Api", json!({"className": "Token", "header": "X"}));
        assert_eq!(name, "Token");
        assert_eq!(config, json!({"header": "X"}));

        let (name, config) = split_class_name("Form", Value::Null);
        assert_eq!(name, "Form");
        assert_eq!(config, Value::Null);

        assert_eq!(split_class_name("Api", class_name("Jwt")).0, "Jwt");
    }

    #[test]
    fn namespaces_are_separate() {
        let registry = Registry::new(Dependencies::default().with_resolver(resolver()));
        assert!(registry.identifier("Token", Value::Null).is_ok());
        assert!(registry
            .authenticator("Token", Value::Null, Arc::new(IdentifierCollection::new()))
            .is_ok());

        assert!(matches!(
            registry.identifier("Form", Value::Null),
            Err(ConfigError::CapabilityMismatch { expected: "Identifier", .. })
        ));
        assert!(matches!(
            registry.authenticator("Password", Value::Null, Arc::new(IdentifierCollection::new())),
            Err(ConfigError::CapabilityMismatch { expected: "Authenticator", .. })
        ));
        assert!(matches!(
            registry.identifier("Missing", Value::Null),
            Err(ConfigError::ClassNotFound { kind: "Identifier", .. })
        ));
    }

    #[test]
    fn resolver_backed_identifiers_need_a_resolver() {
        let registry = Registry::default();
        assert!(matches!(
            registry.identifier("Password", Value::Null),
            Err(ConfigError::Missing { key: "resolver", .. })
        ));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let registry = Registry::new(Dependencies::default().with_resolver(resolver()));
        assert!(matches!(
            registry.identifier("Password", json!({"feilds": {}})),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn callbacks_are_looked_up_by_name() {
        let callback: IdentifyCallback =
            Arc::new(|_: &Credentials| -> Result<Value, BoxError> { Ok(json!({"id": 1})) });
        let registry = Registry::new(Dependencies::default().with_callback("always", callback));

        let identifier = registry
            .identifier("Callback", json!({"callback": "always"}))
            .unwrap();
        assert!(identifier.identify(&Credentials::new()).unwrap().is_found());

        assert!(matches!(
            registry.identifier("Callback", json!({"callback": "never"})),
            Err(ConfigError::UnknownCallback(name)) if name == "never"
        ));
        assert!(matches!(
            registry.identifier("Callback", Value::Null),
            Err(ConfigError::Missing { key: "callback", .. })
        ));
    }

    #[test]
    fn custom_factories_can_be_registered() {
        fn always(_: Value, _: &Dependencies) -> IdentifierResult {
            let callback: IdentifyCallback =
                Arc::new(|_: &Credentials| -> Result<Value, BoxError> { Ok(json!({"id": "custom"})) });
            Ok(Arc::new(CallbackIdentifier::new("always", callback)))
        }

        let mut registry = Registry::default();
        registry.register_identifier("Always", Arc::new(always));
        assert!(registry.identifier_names().any(|name| name == "Always"));
        assert!(registry.identifier("Always", Value::Null).is_ok());
    }
}
