use super::{credentials_missing, Authenticator, Stateless, TokenSource};
use crate::config;
use crate::credentials::{Credentials, CREDENTIAL_JWT_SUBJECT};
use crate::error::{ConfigError, Error};
use crate::http::Request;
use crate::identifier::Identifier;
use crate::identity::IdentityData;
use crate::result::{AuthResult, Status};
use crate::token::{JwtDecoder, TokenDecoder};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Decode a bearer token and turn its subject into an identity.
#[derive(Debug)]
pub(crate) struct ClaimsAuthenticator {
    pub source: TokenSource,
    pub decoder: Box<dyn TokenDecoder>,
    pub return_payload: bool,
    pub subject_key: String,
    pub identifier: Arc<dyn Identifier>,
}

impl ClaimsAuthenticator {
    pub fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let Some(token) = self.source.extract(request) else {
            return Ok(credentials_missing("Token not found"));
        };
        let claims = match self.decoder.decode(&token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "bearer token rejected");
                return Ok(AuthResult::failure(
                    Status::CredentialsInvalid,
                    vec![err.to_string()],
                ));
            }
        };

        let subject = match claims.get(&self.subject_key) {
            Some(Value::String(subject)) => subject.clone(),
            Some(Value::Number(subject)) => subject.to_string(),
            _ => String::new(),
        };
        if subject.is_empty() {
            return Ok(credentials_missing("Token subject not found"));
        }

        if self.return_payload {
            return Ok(AuthResult::success(IdentityData::Fields(claims))?);
        }
        super::identify(
            self.identifier.as_ref(),
            &Credentials::new().with(self.subject_key.as_str(), subject),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct JwtAuthenticatorConfig {
    pub header: Option<String>,
    pub query_param: Option<String>,
    pub token_prefix: Option<String>,
    /// `HS256`, `HS384`, `HS512` or `RS256`, `RS384`, `RS512`.
    pub algorithm: String,
    /// Shared secret, or the PEM public key for `RS*`.
    #[serde(deserialize_with = "config::secret")]
    pub secret_key: Option<SecretString>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Clock skew tolerance in seconds.
    pub leeway: u64,
    /// Use the claims as the identity instead of looking the subject up.
    pub return_payload: bool,
    pub subject_key: String,
}

impl Default for JwtAuthenticatorConfig {
    fn default() -> Self {
        Self {
            header: Some("Authorization".to_string()),
            query_param: Some("token".to_string()),
            token_prefix: Some("bearer".to_string()),
            algorithm: "HS256".to_string(),
            secret_key: None,
            issuer: None,
            audience: None,
            leeway: 0,
            return_payload: true,
            subject_key: CREDENTIAL_JWT_SUBJECT.to_string(),
        }
    }
}

/// Signed JSON Web Tokens carried as bearer tokens.
#[derive(Debug)]
pub struct JwtAuthenticator {
    inner: ClaimsAuthenticator,
}

impl JwtAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] without a key or for an unsupported algorithm.
    pub fn new(
        config: JwtAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        let key = config.secret_key.ok_or(ConfigError::Missing {
            component: "Jwt",
            key: "secretKey",
        })?;
        let decoder = JwtDecoder::new(&config.algorithm, &key)?
            .with_issuer(config.issuer.as_deref())
            .with_audience(config.audience.as_deref())
            .with_leeway(config.leeway);
        Ok(Self {
            inner: ClaimsAuthenticator {
                source: TokenSource {
                    header: config.header,
                    query_param: config.query_param,
                    token_prefix: config.token_prefix,
                },
                decoder: Box::new(decoder),
                return_payload: config.return_payload,
                subject_key: config.subject_key,
                identifier,
            },
        })
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        self.inner.authenticate(request)
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        Some(self)
    }
}

impl Stateless for JwtAuthenticator {
    fn unauthorized_challenge(&self, _request: &Request) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authenticator::testing::SpyIdentifier;
    use http::header::AUTHORIZATION;
    use http::{HeaderValue, Method, Uri};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use time::OffsetDateTime;

    const SECRET: &str = "a-string-secret-at-least-256-bits-long";

    fn sign(claims: &Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn config(return_payload: bool) -> JwtAuthenticatorConfig {
        JwtAuthenticatorConfig {
            secret_key: Some(SecretString::from(SECRET.to_string())),
            return_payload,
            ..JwtAuthenticatorConfig::default()
        }
    }

    fn bearer(token: &str) -> Request {
        Request::new(Method::GET, Uri::from_static("/api"))
            .with_header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
    }

    #[test]
    fn payload_is_the_identity() {
        let spy = Arc::new(SpyIdentifier::default());
        let authenticator = JwtAuthenticator::new(config(true), spy.clone()).unwrap();
        let token = sign(&json!({"sub": 3, "name": "larry"}));

        let result = authenticator.authenticate(&bearer(&token)).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.data().and_then(|d| d.get_str("name")), Some("larry".into()));
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn subject_is_resolved_when_payload_is_not_returned() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 3})));
        let authenticator = JwtAuthenticator::new(config(false), spy.clone()).unwrap();
        let token = sign(&json!({"sub": 3}));

        let uri = format!("/api?token={token}");
        let request = Request::new(Method::GET, uri.parse::<Uri>().unwrap());
        assert!(authenticator.authenticate(&request).unwrap().is_valid());
        assert_eq!(
            spy.last_credentials(),
            Some(vec![("sub".to_string(), "3".to_string())])
        );
    }

    #[test]
    fn failures() {
        let authenticator =
            JwtAuthenticator::new(config(true), Arc::new(SpyIdentifier::default())).unwrap();

        let missing = authenticator
            .authenticate(&Request::new(Method::GET, Uri::from_static("/api")))
            .unwrap();
        assert_eq!(missing.status(), Status::CredentialsMissing);

        let forged = authenticator.authenticate(&bearer("a.b.c")).unwrap();
        assert_eq!(forged.status(), Status::CredentialsInvalid);
        assert!(!forged.errors().is_empty());

        let expired = sign(&json!({
            "sub": 3,
            "exp": OffsetDateTime::now_utc().unix_timestamp() - 60,
        }));
        let result = authenticator.authenticate(&bearer(&expired)).unwrap();
        assert_eq!(result.status(), Status::CredentialsInvalid);

        let anonymous = sign(&json!({"name": "larry"}));
        let result = authenticator.authenticate(&bearer(&anonymous)).unwrap();
        assert_eq!(result.status(), Status::CredentialsMissing);
    }

    #[test]
    fn secret_is_required() {
        let err = JwtAuthenticator::new(
            JwtAuthenticatorConfig::default(),
            Arc::new(SpyIdentifier::default()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "secretKey", .. }));
    }
}
