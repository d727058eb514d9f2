//! Identifiers resolve a credential bag to an identity record.

mod callback;
mod collection;
mod ldap;
mod password;
mod token;
mod verification;

pub use callback::{CallbackIdentifier, CallbackIdentifierConfig, IdentifyCallback};
pub use collection::IdentifierCollection;
pub use ldap::{BindDn, BindDnCallback, BindDnConfig, LdapFields, LdapIdentifier, LdapIdentifierConfig};
pub use password::{PasswordFields, PasswordIdentifier, PasswordIdentifierConfig};
pub use token::{hash_token, JwtSubjectIdentifierConfig, TokenIdentifier, TokenIdentifierConfig};
pub use verification::{VerificationIdentifier, VerificationIdentifierConfig};

use crate::credentials::Credentials;
use crate::error::Error;
use crate::identity::IdentityData;
use std::fmt;

/// Outcome of one identification attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Identification {
    identity: Option<IdentityData>,
    errors: Vec<String>,
    needs_rehash: bool,
    provider: Option<String>,
}

impl Identification {
    #[must_use]
    pub fn found(identity: IdentityData) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    #[must_use]
    pub fn with_needs_rehash(mut self, needs_rehash: bool) -> Self {
        self.needs_rehash = needs_rehash;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, alias: impl Into<String>) -> Self {
        self.provider = Some(alias.into());
        self
    }

    /// Found and non-empty.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.identity.as_ref().is_some_and(|data| !data.is_empty())
    }

    #[must_use]
    pub fn identity(&self) -> Option<&IdentityData> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn into_identity(self) -> Option<IdentityData> {
        self.identity.filter(|data| !data.is_empty())
    }

    /// Diagnostics only; never used for control flow.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The stored password digest should be upgraded.
    #[must_use]
    pub fn needs_password_rehash(&self) -> bool {
        self.needs_rehash
    }

    /// Alias of the identifier that matched, set by [`IdentifierCollection`].
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }
}

pub trait Identifier: fmt::Debug + Send + Sync {
    /// Resolve `credentials`; a miss is `Ok` with no identity.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] only for collaborator failures and contract breaches.
    fn identify(&self, credentials: &Credentials) -> Result<Identification, Error>;

    /// Resolve `credentials` outside of an authentication attempt.
    ///
    /// Collections leave their last-attempt state (provider, errors, rehash
    /// flag) untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Identifier::identify`].
    fn lookup(&self, credentials: &Credentials) -> Result<Identification, Error> {
        self.identify(credentials)
    }
}
