use super::jwt::ClaimsAuthenticator;
use super::{Authenticator, Stateless, TokenSource};
use crate::config;
use crate::credentials::CREDENTIAL_JWT_SUBJECT;
use crate::error::{ConfigError, Error};
use crate::http::Request;
use crate::identifier::Identifier;
use crate::result::AuthResult;
use crate::token::{PasetoDecoder, PasetoPurpose};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PasetoAuthenticatorConfig {
    pub header: Option<String>,
    pub query_param: Option<String>,
    pub token_prefix: Option<String>,
    pub version: String,
    /// `local` (symmetric) or `public` (signed).
    pub purpose: String,
    /// PASERK or base64url key: the shared key for `local`, the public key for `public`.
    #[serde(deserialize_with = "config::secret")]
    pub secret_key: Option<SecretString>,
    pub return_payload: bool,
    pub subject_key: String,
}

impl Default for PasetoAuthenticatorConfig {
    fn default() -> Self {
        Self {
            header: Some("Authorization".to_string()),
            query_param: Some("token".to_string()),
            token_prefix: Some("bearer".to_string()),
            version: "v4".to_string(),
            purpose: "local".to_string(),
            secret_key: None,
            return_payload: true,
            subject_key: CREDENTIAL_JWT_SUBJECT.to_string(),
        }
    }
}

/// PASETO bearer tokens, decrypted or verified before their subject is used.
#[derive(Debug)]
pub struct PasetoAuthenticator {
    inner: ClaimsAuthenticator,
}

impl PasetoAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] without a key, or for an unsupported version,
    /// purpose or key encoding.
    pub fn new(
        config: PasetoAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        let key = config.secret_key.ok_or(ConfigError::Missing {
            component: "Paseto",
            key: "secretKey",
        })?;
        let purpose = PasetoPurpose::parse(&config.purpose)?;
        let decoder = PasetoDecoder::new(&config.version, purpose, &key)?;
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

impl Authenticator for PasetoAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        self.inner.authenticate(request)
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        Some(self)
    }
}

impl Stateless for PasetoAuthenticator {
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
    use base64ct::{Base64UrlUnpadded, Encoding};
    use http::header::AUTHORIZATION;
    use http::{HeaderValue, Method, Uri};
    use pasetors::keys::{Generate, SymmetricKey};
    use pasetors::version4::{LocalToken, V4};
    use serde_json::json;

    fn setup(return_payload: bool, identifier: Arc<SpyIdentifier>) -> (PasetoAuthenticator, SymmetricKey<V4>) {
        let key = SymmetricKey::<V4>::generate().unwrap();
        let config = PasetoAuthenticatorConfig {
            secret_key: Some(SecretString::from(Base64UrlUnpadded::encode_string(
                key.as_bytes(),
            ))),
            return_payload,
            ..PasetoAuthenticatorConfig::default()
        };
        (PasetoAuthenticator::new(config, identifier).unwrap(), key)
    }

    fn bearer(token: &str) -> Request {
        Request::new(Method::GET, Uri::from_static("/api"))
            .with_header(AUTHORIZATION, HeaderValue::from_str(&format!("bearer {token}")).unwrap())
    }

    #[test]
    fn local_token_payload() {
        let (authenticator, key) = setup(true, Arc::new(SpyIdentifier::default()));
        let payload = json!({"sub": "7", "role": "admin"}).to_string();
        let token = LocalToken::encrypt(&key, payload.as_bytes(), None, None).unwrap();

        let result = authenticator.authenticate(&bearer(&token)).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.data().and_then(|d| d.get_str("role")), Some("admin".into()));
    }

    #[test]
    fn subject_lookup_and_foreign_keys() {
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 7})));
        let (authenticator, key) = setup(false, spy.clone());
        let payload = json!({"sub": "7"}).to_string();
        let token = LocalToken::encrypt(&key, payload.as_bytes(), None, None).unwrap();
        assert!(authenticator.authenticate(&bearer(&token)).unwrap().is_valid());
        assert_eq!(
            spy.last_credentials(),
            Some(vec![("sub".to_string(), "7".to_string())])
        );

        let other = SymmetricKey::<V4>::generate().unwrap();
        let foreign = LocalToken::encrypt(&other, payload.as_bytes(), None, None).unwrap();
        let result = authenticator.authenticate(&bearer(&foreign)).unwrap();
        assert_eq!(result.status(), Status::CredentialsInvalid);
    }

    #[test]
    fn rejects_unknown_purpose() {
        let config = PasetoAuthenticatorConfig {
            secret_key: Some(SecretString::from("k".to_string())),
            purpose: "secret".to_string(),
            ..PasetoAuthenticatorConfig::default()
        };
        let err = PasetoAuthenticator::new(config, Arc::new(SpyIdentifier::default()));
        assert!(matches!(err, Err(ConfigError::Unsupported { key: "purpose", .. })));
    }
}
