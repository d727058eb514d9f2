use super::Authenticator;
use crate::error::ConfigError;
use crate::identifier::{Identifier, IdentifierCollection};
use crate::registry::{self, Registry};
use serde_json::Value;
use std::sync::Arc;

/// Ordered authenticators sharing one identifier collection.
#[derive(Debug, Default)]
pub struct AuthenticatorCollection {
    authenticators: Vec<(String, Arc<dyn Authenticator>)>,
    identifiers: Arc<IdentifierCollection>,
}

impl AuthenticatorCollection {
    #[must_use]
    pub fn new(identifiers: Arc<IdentifierCollection>) -> Self {
        Self {
            authenticators: Vec::new(),
            identifiers,
        }
    }

    /// Build an authenticator from the registry, wired to the shared
    /// identifiers, and append it under `alias`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the alias is taken, the name is unknown or
    /// names an identifier, or the config is rejected.
    pub fn load(
        &mut self,
        registry: &Registry,
        alias: &str,
        config: Value,
    ) -> Result<Arc<dyn Authenticator>, ConfigError> {
        self.ensure_free(alias)?;
        let (class_name, config) = registry::split_class_name(alias, config);
        let identifier: Arc<dyn Identifier> = self.identifiers.clone();
        let authenticator = registry.authenticator(&class_name, config, identifier)?;
        self.authenticators
            .push((alias.to_string(), Arc::clone(&authenticator)));
        Ok(authenticator)
    }

    /// Append an already built authenticator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateAlias`] when `alias` is taken.
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<(), ConfigError> {
        let alias = alias.into();
        self.ensure_free(&alias)?;
        self.authenticators.push((alias, authenticator));
        Ok(())
    }

    fn ensure_free(&self, alias: &str) -> Result<(), ConfigError> {
        if self.get(alias).is_some() {
            return Err(ConfigError::DuplicateAlias {
                kind: "Authenticator",
                alias: alias.to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Arc<dyn Authenticator>> {
        self.authenticators
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, authenticator)| authenticator)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.authenticators.iter().map(|(alias, _)| alias.as_str())
    }

    /// Authenticators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Authenticator>)> {
        self.authenticators
            .iter()
            .map(|(alias, authenticator)| (alias.as_str(), authenticator))
    }

    #[must_use]
    pub fn identifiers(&self) -> &Arc<IdentifierCollection> {
        &self.identifiers
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authenticator::FormAuthenticator;
    use serde_json::json;

    #[test]
    fn loads_in_order_and_rejects_duplicates() {
        let registry = Registry::default();
        let mut collection = AuthenticatorCollection::default();
        collection.load(&registry, "Session", Value::Null).unwrap();
        collection
            .load(&registry, "Api", json!({"className": "Token", "header": "X-Api-Key"}))
            .unwrap();

        assert_eq!(collection.aliases().collect::<Vec<_>>(), vec!["Session", "Api"]);
        assert!(matches!(
            collection.load(&registry, "Api", Value::Null),
            Err(ConfigError::DuplicateAlias { kind: "Authenticator", .. })
        ));
    }

    #[test]
    fn identifier_names_are_not_authenticators() {
        let registry = Registry::default();
        let mut collection = AuthenticatorCollection::default();
        assert!(matches!(
            collection.load(&registry, "Password", Value::Null),
            Err(ConfigError::CapabilityMismatch { .. })
        ));
        assert!(matches!(
            collection.load(&registry, "Nope", Value::Null),
            Err(ConfigError::ClassNotFound { .. })
        ));
        assert!(collection.is_empty());
    }

    #[test]
    fn registered_instances_share_the_identifiers() {
        let mut collection = AuthenticatorCollection::default();
        let identifier: Arc<dyn Identifier> = collection.identifiers().clone();
        let form = FormAuthenticator::new(Default::default(), identifier).unwrap();
        collection.register("Form", Arc::new(form)).unwrap();
        assert_eq!(collection.len(), 1);
        assert!(collection.get("Form").is_some());
    }
}
