use super::{credentials_missing, identify, Authenticator, Stateless};
use crate::credentials::{Credentials, CREDENTIAL_TOKEN};
use crate::error::Error;
use crate::http::Request;
use crate::identifier::Identifier;
use crate::result::AuthResult;
use serde::Deserialize;
use std::sync::Arc;

/// Where a bearer token is read from; the header wins over the query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSource {
    pub header: Option<String>,
    pub query_param: Option<String>,
    /// Case-insensitive scheme stripped from the value, e.g. `Bearer`.
    pub token_prefix: Option<String>,
}

impl TokenSource {
    #[must_use]
    pub fn extract(&self, request: &Request) -> Option<String> {
        let token = self
            .header
            .as_deref()
            .and_then(|header| request.header_str(header))
            .map(str::to_string)
            .filter(|token| !token.is_empty())
            .or_else(|| {
                self.query_param
                    .as_deref()
                    .and_then(|param| request.query_param(param))
                    .filter(|token| !token.is_empty())
            })?;
        let token = match self.token_prefix.as_deref() {
            Some(prefix) => strip_prefix(&token, prefix),
            None => token,
        };
        let token = token.trim().to_string();
        (!token.is_empty()).then_some(token)
    }
}

fn strip_prefix(token: &str, prefix: &str) -> String {
    let expected = format!("{prefix} ");
    match token.get(..expected.len()) {
        Some(head) if head.eq_ignore_ascii_case(&expected) => token[expected.len()..].to_string(),
        _ => token.to_string(),
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TokenAuthenticatorConfig {
    pub header: Option<String>,
    pub query_param: Option<String>,
    pub token_prefix: Option<String>,
}

impl From<TokenAuthenticatorConfig> for TokenSource {
    fn from(config: TokenAuthenticatorConfig) -> Self {
        Self {
            header: config.header,
            query_param: config.query_param,
            token_prefix: config.token_prefix,
        }
    }
}

/// Opaque token from a header or query parameter, resolved by the identifier.
#[derive(Debug)]
pub struct TokenAuthenticator {
    source: TokenSource,
    identifier: Arc<dyn Identifier>,
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(config: TokenAuthenticatorConfig, identifier: Arc<dyn Identifier>) -> Self {
        Self {
            source: config.into(),
            identifier,
        }
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let Some(token) = self.source.extract(request) else {
            return Ok(credentials_missing("Token not found"));
        };
        identify(
            self.identifier.as_ref(),
            &Credentials::new().with(CREDENTIAL_TOKEN, token),
        )
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        Some(self)
    }
}

// Tokens are obtained out of band; there is nothing to prompt for.
impl Stateless for TokenAuthenticator {
    fn unauthorized_challenge(&self, _request: &Request) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authenticator::testing::SpyIdentifier;
    use crate::result::Status;
    use http::{HeaderName, HeaderValue, Method, Uri};
    use serde_json::json;

    fn authenticator(identifier: Arc<SpyIdentifier>) -> TokenAuthenticator {
        TokenAuthenticator::new(
            TokenAuthenticatorConfig {
                header: Some("Token".into()),
                query_param: Some("token".into()),
                token_prefix: Some("identity".into()),
            },
            identifier,
        )
    }

    #[test]
    fn header_wins_over_query() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1})));
        let request = Request::new(Method::GET, Uri::from_static("/?token=from-query"))
            .with_header(
                HeaderName::from_static("token"),
                HeaderValue::from_static("Identity from-header"),
            );
        let result = authenticator(spy.clone()).authenticate(&request).unwrap();
        assert!(result.is_valid());
        assert_eq!(
            spy.last_credentials(),
            Some(vec![("token".to_string(), "from-header".to_string())])
        );
    }

    #[test]
    fn query_is_the_fallback() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1})));
        let request = Request::new(Method::GET, Uri::from_static("/?token=abc"));
        authenticator(spy.clone()).authenticate(&request).unwrap();
        assert_eq!(
            spy.last_credentials(),
            Some(vec![("token".to_string(), "abc".to_string())])
        );
    }

    #[test]
    fn missing_token_never_reaches_the_identifier() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1})));
        let request = Request::new(Method::GET, Uri::from_static("/"));
        let result = authenticator(spy.clone()).authenticate(&request).unwrap();
        assert_eq!(result.status(), Status::CredentialsMissing);
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn unknown_token_is_identity_not_found() {
        let spy = Arc::new(SpyIdentifier::default());
        let request = Request::new(Method::GET, Uri::from_static("/?token=abc"));
        let authenticator = authenticator(spy);
        let result = authenticator.authenticate(&request).unwrap();
        assert_eq!(result.status(), Status::IdentityNotFound);
        assert!(authenticator
            .as_stateless()
            .is_some_and(|stateless| stateless.unauthorized_challenge(&request).is_ok()));
    }

    #[test]
    fn prefix_is_case_insensitive() {
        assert_eq!(strip_prefix("BEARER abc", "bearer"), "abc");
        assert_eq!(strip_prefix("abc", "bearer"), "abc");
        assert_eq!(strip_prefix("bearerabc", "bearer"), "bearerabc");
    }
}
