//! Authenticators extract credentials from one request channel and verify them.
//!
//! Persistence, stateless challenge and impersonation are separate, optional
//! capabilities; callers discover them through the `as_*` accessors rather
//! than by concrete type.

mod basic;
mod collection;
mod cookie;
mod digest;
mod environment;
mod form;
mod jwt;
mod paseto;
mod session;
mod token;

pub use basic::{HttpBasicAuthenticator, HttpBasicAuthenticatorConfig};
pub use collection::AuthenticatorCollection;
pub use cookie::{CookieAuthenticator, CookieAuthenticatorConfig, CookieOptions};
pub use digest::{HttpDigestAuthenticator, HttpDigestAuthenticatorConfig};
pub use environment::{EnvironmentAuthenticator, EnvironmentAuthenticatorConfig};
pub use form::{FormAuthenticator, FormAuthenticatorConfig};
pub use jwt::{JwtAuthenticator, JwtAuthenticatorConfig};
pub use paseto::{PasetoAuthenticator, PasetoAuthenticatorConfig};
pub use session::{SessionAuthenticator, SessionAuthenticatorConfig};
pub use token::{TokenAuthenticator, TokenAuthenticatorConfig, TokenSource};

use crate::credentials::{Credentials, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::error::Error;
use crate::http::{Request, Response};
use crate::identifier::Identifier;
use crate::identity::IdentityData;
use crate::result::{AuthResult, Status};
use serde::Deserialize;
use std::fmt;

pub trait Authenticator: fmt::Debug + Send + Sync {
    /// Extract credentials and verify them.
    ///
    /// Credential failures are encoded in the returned [`AuthResult`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for collaborator failures only.
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error>;

    fn as_persistence(&self) -> Option<&dyn Persistence> {
        None
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        None
    }

    fn as_impersonation(&self) -> Option<&dyn Impersonation> {
        None
    }
}

/// Durable identity storage across requests (session, cookie).
pub trait Persistence {
    /// # Errors
    ///
    /// Returns an [`Error`] when the store rejects the write.
    fn persist_identity(
        &self,
        request: Request,
        response: Response,
        identity: &IdentityData,
    ) -> Result<(Request, Response), Error>;

    /// # Errors
    ///
    /// Returns an [`Error`] when the store rejects the delete.
    fn clear_identity(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error>;
}

/// Authenticators that can ask the client to resubmit credentials.
pub trait Stateless {
    /// Raise the challenge for a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Challenge`] carrying the headers to send; `Ok(())`
    /// means this authenticator has nothing to challenge with.
    fn unauthorized_challenge(&self, request: &Request) -> Result<(), Error>;
}

/// Acting as another user while remembering the original identity.
pub trait Impersonation: Persistence {
    /// # Errors
    ///
    /// Returns [`Error::AlreadyImpersonating`] when an impersonation is active.
    fn impersonate(
        &self,
        request: Request,
        response: Response,
        impersonator: &IdentityData,
        impersonated: &IdentityData,
    ) -> Result<(Request, Response), Error>;

    /// # Errors
    ///
    /// Returns an [`Error`] when the store rejects the restore.
    fn stop_impersonating(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error>;

    fn is_impersonating(&self, request: &Request) -> bool;
}

/// Identity record fields holding the username and the stored secret.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RecordFields {
    pub username: String,
    pub password: String,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            username: CREDENTIAL_USERNAME.to_string(),
            password: CREDENTIAL_PASSWORD.to_string(),
        }
    }
}

/// Hand `credentials` to the identifier and map the outcome to a result.
pub(crate) fn identify(
    identifier: &dyn Identifier,
    credentials: &Credentials,
) -> Result<AuthResult, Error> {
    let identification = identifier.identify(credentials)?;
    let errors = identification.errors().to_vec();
    match identification.into_identity() {
        Some(identity) => Ok(AuthResult::success(identity)?),
        None => Ok(AuthResult::failure(Status::IdentityNotFound, errors)),
    }
}

pub(crate) fn credentials_missing(message: &str) -> AuthResult {
    AuthResult::failure(Status::CredentialsMissing, vec![message.to_string()])
}

#[cfg(test)]
pub(crate) mod testing {
    //! Collaborators shared by the authenticator tests.

    use crate::credentials::Credentials;
    use crate::error::Error;
    use crate::identifier::{Identification, Identifier};
    use crate::identity::{Fields, IdentityData};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed identity and records every credential bag it sees.
    #[derive(Debug, Default)]
    pub struct SpyIdentifier {
        pub identity: Option<Fields>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl SpyIdentifier {
        pub fn returning(identity: Value) -> Self {
            Self {
                identity: match identity {
                    Value::Object(fields) => Some(fields),
                    _ => None,
                },
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_credentials(&self) -> Option<Vec<(String, String)>> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .last()
                .cloned()
        }
    }

    impl Identifier for SpyIdentifier {
        fn identify(&self, credentials: &Credentials) -> Result<Identification, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(
                    credentials
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                );
            Ok(self.identity.clone().map_or_else(
                || Identification::not_found().with_errors(vec!["not found".to_string()]),
                |fields| Identification::found(IdentityData::Fields(fields)),
            ))
        }
    }
}
