use super::{credentials_missing, identify, Authenticator, Stateless};
use crate::credentials::{Credentials, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::error::Error;
use crate::http::{Challenge, Request, AUTH_PW, AUTH_USER, SERVER_NAME};
use crate::identifier::Identifier;
use crate::result::AuthResult;
use serde::Deserialize;
use std::sync::Arc;

pub(crate) const CHALLENGE_BODY: &str = "Authentication is required to continue";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HttpBasicAuthenticatorConfig {
    /// Defaults to the request's server name.
    pub realm: Option<String>,
    /// Fail quietly instead of raising a challenge.
    pub skip_challenge: bool,
}

/// Credentials the server decoded from `Authorization: Basic`.
#[derive(Debug)]
pub struct HttpBasicAuthenticator {
    realm: Option<String>,
    skip_challenge: bool,
    identifier: Arc<dyn Identifier>,
}

impl HttpBasicAuthenticator {
    #[must_use]
    pub fn new(config: HttpBasicAuthenticatorConfig, identifier: Arc<dyn Identifier>) -> Self {
        Self {
            realm: config.realm,
            skip_challenge: config.skip_challenge,
            identifier,
        }
    }

    pub(crate) fn realm(realm: Option<&str>, request: &Request) -> String {
        realm
            .filter(|realm| !realm.is_empty())
            .or_else(|| request.server_param(SERVER_NAME))
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn login_headers(&self, request: &Request) -> Vec<(String, String)> {
        let realm = Self::realm(self.realm.as_deref(), request);
        vec![(
            "WWW-Authenticate".to_string(),
            format!("Basic realm=\"{realm}\""),
        )]
    }
}

impl Authenticator for HttpBasicAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let username = request.server_param(AUTH_USER).unwrap_or_default();
        let password = request.server_param(AUTH_PW).unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Ok(credentials_missing("Login credentials not found"));
        }
        identify(
            self.identifier.as_ref(),
            &Credentials::new()
                .with(CREDENTIAL_USERNAME, username)
                .with(CREDENTIAL_PASSWORD, password),
        )
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        Some(self)
    }
}

impl Stateless for HttpBasicAuthenticator {
    fn unauthorized_challenge(&self, request: &Request) -> Result<(), Error> {
        if self.skip_challenge {
            return Ok(());
        }
        Err(Challenge::new(self.login_headers(request))
            .with_body(CHALLENGE_BODY)
            .into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authenticator::testing::SpyIdentifier;
    use crate::result::Status;
    use http::{Method, Uri};
    use serde_json::json;

    fn request() -> Request {
        Request::new(Method::GET, Uri::from_static("http://example.com/api"))
    }

    #[test]
    fn missing_credentials_skip_the_identifier() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1})));
        let authenticator = HttpBasicAuthenticator::new(Default::default(), spy.clone());

        let only_user = request().with_server_param(AUTH_USER, "mariano");
        for request in [request(), only_user] {
            let result = authenticator.authenticate(&request).unwrap();
            assert_eq!(result.status(), Status::CredentialsMissing);
        }
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn forwards_username_and_password() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1})));
        let authenticator = HttpBasicAuthenticator::new(Default::default(), spy.clone());
        let request = request()
            .with_server_param(AUTH_USER, "mariano")
            .with_server_param(AUTH_PW, "password");

        assert!(authenticator.authenticate(&request).unwrap().is_valid());
        assert_eq!(
            spy.last_credentials(),
            Some(vec![
                ("username".to_string(), "mariano".to_string()),
                ("password".to_string(), "password".to_string()),
            ])
        );
    }

    #[test]
    fn challenge_defaults_to_server_name() {
        let authenticator =
            HttpBasicAuthenticator::new(Default::default(), Arc::new(SpyIdentifier::default()));
        let challenge = authenticator
            .unauthorized_challenge(&request())
            .unwrap_err()
            .into_challenge()
            .unwrap();
        assert_eq!(
            challenge.header("WWW-Authenticate"),
            Some("Basic realm=\"example.com\"")
        );
        assert_eq!(challenge.body(), CHALLENGE_BODY);
    }

    #[test]
    fn configured_realm_and_skip() {
        let identifier = Arc::new(SpyIdentifier::default());
        let realm = HttpBasicAuthenticator::new(
            HttpBasicAuthenticatorConfig {
                realm: Some("admin".into()),
                skip_challenge: false,
            },
            identifier.clone(),
        );
        assert_eq!(
            realm.login_headers(&request())[0].1,
            "Basic realm=\"admin\""
        );

        let quiet = HttpBasicAuthenticator::new(
            HttpBasicAuthenticatorConfig {
                realm: None,
                skip_challenge: true,
            },
            identifier,
        );
        assert!(quiet.unauthorized_challenge(&request()).is_ok());
    }
}
