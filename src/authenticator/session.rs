use super::{Authenticator, Impersonation, Persistence};
use crate::config::string_pairs;
use crate::credentials::{Credentials, CREDENTIAL_USERNAME};
use crate::error::{ConfigError, Error};
use crate::http::{Request, Response, Session};
use crate::identifier::Identifier;
use crate::identity::IdentityData;
use crate::result::{AuthResult, Status};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SessionAuthenticatorConfig {
    pub session_key: String,
    /// Re-check the stored identity against the identifier on every request.
    pub identify: bool,
    /// Credential key → stored identity field, used when re-identifying.
    pub fields: Map<String, Value>,
    pub impersonate_session_key: String,
}

impl Default for SessionAuthenticatorConfig {
    fn default() -> Self {
        let mut fields = Map::new();
        fields.insert(CREDENTIAL_USERNAME.into(), CREDENTIAL_USERNAME.into());
        Self {
            session_key: "Auth".to_string(),
            identify: false,
            fields,
            impersonate_session_key: "AuthImpersonate".to_string(),
        }
    }
}

/// Identity stored in the server-side session.
#[derive(Debug)]
pub struct SessionAuthenticator {
    session_key: String,
    identify: bool,
    fields: Vec<(String, String)>,
    impersonate_session_key: String,
    identifier: Arc<dyn Identifier>,
}

impl SessionAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-string field names.
    pub fn new(
        config: SessionAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            session_key: config.session_key,
            identify: config.identify,
            fields: string_pairs("Session", "fields", config.fields)?,
            impersonate_session_key: config.impersonate_session_key,
            identifier,
        })
    }

    fn session(request: &Request) -> Result<&Arc<dyn Session>, Error> {
        request.session().ok_or(Error::NoSession)
    }

    fn reidentify(&self, stored: &IdentityData) -> Result<bool, Error> {
        let credentials: Credentials = self
            .fields
            .iter()
            .filter_map(|(key, field)| stored.get_str(field).map(|value| (key.clone(), value)))
            .collect();
        Ok(self.identifier.identify(&credentials)?.is_found())
    }
}

impl Authenticator for SessionAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let stored = request
            .session()
            .and_then(|session| session.read(&self.session_key))
            .and_then(IdentityData::from_value)
            .filter(|identity| !identity.is_empty());
        let Some(identity) = stored else {
            return Ok(AuthResult::failure(Status::IdentityNotFound, Vec::new()));
        };

        if self.identify && !self.reidentify(&identity)? {
            debug!(key = %self.session_key, "stored identity no longer resolves");
            return Ok(AuthResult::failure(Status::CredentialsInvalid, Vec::new()));
        }
        Ok(AuthResult::success(identity)?)
    }

    fn as_persistence(&self) -> Option<&dyn Persistence> {
        Some(self)
    }

    fn as_impersonation(&self) -> Option<&dyn Impersonation> {
        Some(self)
    }
}

impl Persistence for SessionAuthenticator {
    fn persist_identity(
        &self,
        request: Request,
        response: Response,
        identity: &IdentityData,
    ) -> Result<(Request, Response), Error> {
        let session = Self::session(&request)?;
        // Replaying persist for a logged in session must not rotate the id again.
        if !session.check(&self.session_key) {
            session.renew().map_err(Error::Backend)?;
            session
                .write(&self.session_key, identity.clone().into_value())
                .map_err(Error::Backend)?;
            debug!(key = %self.session_key, "identity written to session");
        }
        Ok((request, response))
    }

    fn clear_identity(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error> {
        let session = Self::session(&request)?;
        session
            .delete(&self.session_key)
            .map_err(Error::Backend)?;
        session
            .delete(&self.impersonate_session_key)
            .map_err(Error::Backend)?;
        session.renew().map_err(Error::Backend)?;
        Ok((request, response))
    }
}

impl Impersonation for SessionAuthenticator {
    fn impersonate(
        &self,
        request: Request,
        response: Response,
        impersonator: &IdentityData,
        impersonated: &IdentityData,
    ) -> Result<(Request, Response), Error> {
        let session = Self::session(&request)?;
        if session.check(&self.impersonate_session_key) {
            return Err(Error::AlreadyImpersonating);
        }
        session
            .write(&self.impersonate_session_key, impersonator.clone().into_value())
            .map_err(Error::Backend)?;
        session
            .write(&self.session_key, impersonated.clone().into_value())
            .map_err(Error::Backend)?;
        info!("impersonation started");
        Ok((request, response))
    }

    fn stop_impersonating(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error> {
        let session = Self::session(&request)?;
        if let Some(original) = session.read(&self.impersonate_session_key) {
            session
                .delete(&self.impersonate_session_key)
                .map_err(Error::Backend)?;
            session
                .write(&self.session_key, original)
                .map_err(Error::Backend)?;
            info!("impersonation stopped");
        }
        Ok((request, response))
    }

    fn is_impersonating(&self, request: &Request) -> bool {
        request
            .session()
            .is_some_and(|session| session.check(&self.impersonate_session_key))
    }
}
