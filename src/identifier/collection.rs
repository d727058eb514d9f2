use super::{Identification, Identifier};
use crate::credentials::Credentials;
use crate::error::{ConfigError, Error};
use crate::registry::{self, Registry};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct LastAttempt {
    provider: Option<String>,
    errors: Vec<(String, Vec<String>)>,
    needs_rehash: bool,
}

/// Ordered identifiers tried in turn; the first hit wins.
#[derive(Debug, Default)]
pub struct IdentifierCollection {
    identifiers: Vec<(String, Arc<dyn Identifier>)>,
    last: Mutex<LastAttempt>,
}

impl IdentifierCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an identifier from the registry and append it under `alias`.
    ///
    /// The concrete type is `config.className` when given, `alias` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the alias is taken, the name is unknown or
    /// names an authenticator, or the config is rejected.
    pub fn load(
        &mut self,
        registry: &Registry,
        alias: &str,
        config: Value,
    ) -> Result<Arc<dyn Identifier>, ConfigError> {
        self.ensure_free(alias)?;
        let (class_name, config) = registry::split_class_name(alias, config);
        let identifier = registry.identifier(&class_name, config)?;
        self.identifiers
            .push((alias.to_string(), Arc::clone(&identifier)));
        Ok(identifier)
    }

    /// Append an already built identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateAlias`] when `alias` is taken.
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        identifier: Arc<dyn Identifier>,
    ) -> Result<(), ConfigError> {
        let alias = alias.into();
        self.ensure_free(&alias)?;
        self.identifiers.push((alias, identifier));
        Ok(())
    }

    fn ensure_free(&self, alias: &str) -> Result<(), ConfigError> {
        if self.get(alias).is_some() {
            return Err(ConfigError::DuplicateAlias {
                kind: "Identifier",
                alias: alias.to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Arc<dyn Identifier>> {
        self.identifiers
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, identifier)| identifier)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Aliases in registration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|(alias, _)| alias.as_str())
    }

    /// Alias of the identifier that matched during the last attempt.
    #[must_use]
    pub fn successful_identifier(&self) -> Option<String> {
        self.last().provider.clone()
    }

    /// Diagnostics of the last attempt, keyed by alias.
    #[must_use]
    pub fn errors(&self) -> Vec<(String, Vec<String>)> {
        self.last().errors.clone()
    }

    #[must_use]
    pub fn needs_password_rehash(&self) -> bool {
        self.last().needs_rehash
    }

    fn last(&self) -> MutexGuard<'_, LastAttempt> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn flatten(errors: &[(String, Vec<String>)]) -> Vec<String> {
    errors
        .iter()
        .flat_map(|(alias, messages)| {
            messages
                .iter()
                .map(move |message| format!("{alias}: {message}"))
        })
        .collect()
}

impl IdentifierCollection {
    fn resolve(&self, credentials: &Credentials) -> Result<(Identification, LastAttempt), Error> {
        let mut errors: Vec<(String, Vec<String>)> = Vec::new();
        for (alias, identifier) in &self.identifiers {
            let identification = identifier.identify(credentials)?;
            if identification.is_found() {
                debug!(identifier = %alias, "identifier matched");
                let flattened = flatten(&errors);
                let attempt = LastAttempt {
                    provider: Some(alias.clone()),
                    errors,
                    needs_rehash: identification.needs_password_rehash(),
                };
                let identification = identification
                    .with_provider(alias.clone())
                    .with_errors(flattened);
                return Ok((identification, attempt));
            }
            if !identification.errors().is_empty() {
                errors.push((alias.clone(), identification.errors().to_vec()));
            }
        }

        debug!(tried = self.identifiers.len(), "no identifier matched");
        let flattened = flatten(&errors);
        let attempt = LastAttempt {
            provider: None,
            errors,
            needs_rehash: false,
        };
        Ok((Identification::not_found().with_errors(flattened), attempt))
    }
}

impl Identifier for IdentifierCollection {
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
        let (identification, attempt) = self.resolve(credentials)?;
        *self.last() = attempt;
        Ok(identification)
    }

    fn lookup(&self, credentials: &Credentials) -> Result<Identification, Error> {
        self.resolve(credentials).map(|(identification, _)| identification)
    }
}
