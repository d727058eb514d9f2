//! RFC 2617 Digest authentication with stateless, self-verifying nonces.

use super::basic::{HttpBasicAuthenticator, CHALLENGE_BODY};
use super::{credentials_missing, Authenticator, RecordFields, Stateless};
use crate::config;
use crate::credentials::{Credentials, CREDENTIAL_USERNAME};
use crate::error::{ConfigError, Error};
use crate::http::{Challenge, Request, AUTH_DIGEST, ORIGINAL_REQUEST_METHOD, REQUEST_METHOD};
use crate::identifier::Identifier;
use crate::nonce;
use crate::result::{AuthResult, Status};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tracing::debug;

const REQUIRED: [&str; 7] = ["nonce", "nc", "cnonce", "qop", "username", "uri", "response"];

fn param_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(\w+)=(?:"([^"]*)"|'([^']*)'|([a-zA-Z0-9:#%?&@=./_-]+))"#).ok()
        })
        .as_ref()
}

/// Split a Digest header body into its parameters.
///
/// Returns `None` unless every parameter a response needs is present.
#[must_use]
pub fn parse_digest(header: &str) -> Option<BTreeMap<String, String>> {
    let pattern = param_pattern()?;
    let params: BTreeMap<String, String> = pattern
        .captures_iter(header)
        .filter_map(|captures| {
            let key = captures.get(1)?.as_str().to_string();
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))?
                .as_str()
                .to_string();
            Some((key, value))
        })
        .collect();
    REQUIRED
        .iter()
        .all(|key| params.contains_key(*key))
        .then_some(params)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HttpDigestAuthenticatorConfig {
    /// Keys the nonce signature.
    #[serde(deserialize_with = "config::secret")]
    pub secret: Option<SecretString>,
    pub realm: Option<String>,
    pub qop: String,
    /// Seconds a freshly issued nonce stays valid.
    pub nonce_lifetime: i64,
    /// Defaults to the MD5 of the realm.
    pub opaque: Option<String>,
    /// `password` names the record field holding the stored HA1 digest.
    pub fields: RecordFields,
    pub skip_challenge: bool,
}

impl Default for HttpDigestAuthenticatorConfig {
    fn default() -> Self {
        Self {
            secret: None,
            realm: None,
            qop: "auth".to_string(),
            nonce_lifetime: 300,
            opaque: None,
            fields: RecordFields::default(),
            skip_challenge: false,
        }
    }
}

#[derive(Debug)]
pub struct HttpDigestAuthenticator {
    secret: SecretString,
    realm: Option<String>,
    qop: String,
    nonce_lifetime: i64,
    opaque: Option<String>,
    fields: RecordFields,
    skip_challenge: bool,
    identifier: Arc<dyn Identifier>,
}

impl HttpDigestAuthenticator {
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without a nonce secret and
    /// [`ConfigError::Unsupported`] for a nonce lifetime that is not positive
    /// or overflows the clock.
    pub fn new(
        config: HttpDigestAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
    ) -> Result<Self, ConfigError> {
        let secret = config.secret.ok_or(ConfigError::Missing {
            component: "HttpDigest",
            key: "secret",
        })?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if config.nonce_lifetime <= 0 || now.checked_add(config.nonce_lifetime).is_none() {
            return Err(ConfigError::Unsupported {
                component: "HttpDigest",
                key: "nonceLifetime",
                value: config.nonce_lifetime.to_string(),
            });
        }
        Ok(Self {
            secret,
            realm: config.realm,
            qop: config.qop,
            nonce_lifetime: config.nonce_lifetime,
            opaque: config.opaque,
            fields: config.fields,
            skip_challenge: config.skip_challenge,
            identifier,
        })
    }

    /// The HA1 value to store for a user: `md5(username:realm:password)`.
    #[must_use]
    pub fn password(username: &str, password: &str, realm: &str) -> String {
        md5_hex(&format!("{username}:{realm}:{password}"))
    }

    /// Expected `response` for the presented parameters.
    #[must_use]
    pub fn generate_response_hash(
        digest: &BTreeMap<String, String>,
        ha1: &str,
        method: &str,
    ) -> String {
        let param = |key: &str| digest.get(key).map_or("", String::as_str);
        let ha2 = md5_hex(&format!("{method}:{}", param("uri")));
        md5_hex(&format!(
            "{ha1}:{}:{}:{}:{}:{ha2}",
            param("nonce"),
            param("nc"),
            param("cnonce"),
            param("qop")
        ))
    }

    /// Issue a nonce expiring `nonceLifetime` seconds from now.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the secret can not key the signature.
    pub fn generate_nonce(&self) -> Result<String, Error> {
        let expires_at = OffsetDateTime::now_utc()
            .unix_timestamp()
            .saturating_add(self.nonce_lifetime);
        nonce::generate(self.secret.expose_secret(), expires_at).map_err(Error::backend)
    }

    fn valid_nonce(&self, presented: &str) -> bool {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match nonce::validate(presented, self.secret.expose_secret(), now) {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "digest nonce rejected");
                false
            }
        }
    }

    fn digest(request: &Request) -> Option<BTreeMap<String, String>> {
        let header = request
            .server_param(AUTH_DIGEST)
            .filter(|digest| !digest.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let authorization = request.header_str("Authorization")?;
                let scheme = authorization.get(..7)?;
                scheme
                    .eq_ignore_ascii_case("Digest ")
                    .then(|| authorization[7..].to_string())
            })?;
        parse_digest(&header)
    }

    /// Headers for a fresh challenge, flagged stale when the client's nonce
    /// has lapsed.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when no nonce can be issued.
    pub fn login_headers(&self, request: &Request) -> Result<Vec<(String, String)>, Error> {
        let realm = HttpBasicAuthenticator::realm(self.realm.as_deref(), request);
        let opaque = self.opaque.clone().unwrap_or_else(|| md5_hex(&realm));
        let mut value = format!(
            "Digest realm=\"{realm}\",qop=\"{}\",nonce=\"{}\",opaque=\"{opaque}\"",
            self.qop,
            self.generate_nonce()?
        );
        let stale = Self::digest(request)
            .and_then(|digest| digest.get("nonce").cloned())
            .is_some_and(|presented| !self.valid_nonce(&presented));
        if stale {
            value.push_str(",stale=true");
        }
        Ok(vec![("WWW-Authenticate".to_string(), value)])
    }
}

impl Authenticator for HttpDigestAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let Some(digest) = Self::digest(request) else {
            return Ok(credentials_missing("Login credentials not found"));
        };
        let Some(username) = digest.get("username").filter(|username| !username.is_empty()) else {
            return Ok(credentials_missing("Login credentials not found"));
        };

        let identification = self
            .identifier
            .identify(&Credentials::new().with(CREDENTIAL_USERNAME, username))?;
        let errors = identification.errors().to_vec();
        let Some(identity) = identification.into_identity() else {
            return Ok(AuthResult::failure(Status::IdentityNotFound, errors));
        };

        let nonce = digest.get("nonce").map_or("", String::as_str);
        if !self.valid_nonce(nonce) {
            return Ok(AuthResult::failure(
                Status::CredentialsInvalid,
                vec!["Nonce is invalid or expired".to_string()],
            ));
        }

        let Some(ha1) = identity.get_str(&self.fields.password) else {
            return Ok(AuthResult::failure(Status::CredentialsInvalid, Vec::new()));
        };
        let method = request
            .server_param(ORIGINAL_REQUEST_METHOD)
            .filter(|method| !method.is_empty())
            .or_else(|| request.server_param(REQUEST_METHOD))
            .unwrap_or_default();
        let expected = Self::generate_response_hash(&digest, &ha1, method);
        let presented = digest.get("response").map_or("", String::as_str);
        if !bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
            return Ok(AuthResult::failure(
                Status::CredentialsInvalid,
                vec!["Digest response does not match".to_string()],
            ));
        }
        Ok(AuthResult::success(identity.without(&self.fields.password))?)
    }

    fn as_stateless(&self) -> Option<&dyn Stateless> {
        Some(self)
    }
}

impl Stateless for HttpDigestAuthenticator {
    fn unauthorized_challenge(&self, request: &Request) -> Result<(), Error> {
        if self.skip_challenge {
            return Ok(());
        }
        Err(Challenge::new(self.login_headers(request)?)
            .with_body(CHALLENGE_BODY)
            .into())
    }
}
