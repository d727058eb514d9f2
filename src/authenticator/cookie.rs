use super::{credentials_missing, Authenticator, Persistence, RecordFields};
use crate::config::StringList;
use crate::credentials::{Credentials, CREDENTIAL_USERNAME};
use crate::error::{ConfigError, Error};
use crate::hasher::PasswordHasher;
use crate::http::{Cookie, Request, Response};
use crate::identifier::Identifier;
use crate::identity::IdentityData;
use crate::result::{AuthResult, Status};
use crate::url_matcher::{UrlMatcher, UrlMatcherConfig};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CookieOptions {
    pub name: String,
    /// Lifetime in seconds; a session cookie when unset.
    pub max_age: Option<i64>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "CookieAuth".to_string(),
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CookieAuthenticatorConfig {
    pub cookie: CookieOptions,
    /// Body field that opts a login into the remember-me cookie.
    pub remember_me_field: String,
    /// Identity fields the token is derived from.
    pub fields: RecordFields,
    pub login_url: StringList,
    pub url_checker: UrlMatcherConfig,
}

impl Default for CookieAuthenticatorConfig {
    fn default() -> Self {
        Self {
            cookie: CookieOptions::default(),
            remember_me_field: "remember_me".to_string(),
            fields: RecordFields::default(),
            login_url: StringList::default(),
            url_checker: UrlMatcherConfig::default(),
        }
    }
}

/// Remember-me cookie holding `[username, hash(username + password digest)]`.
#[derive(Debug)]
pub struct CookieAuthenticator {
    cookie: CookieOptions,
    remember_me_field: String,
    fields: RecordFields,
    login_url: UrlMatcher,
    identifier: Arc<dyn Identifier>,
    hasher: Arc<dyn PasswordHasher>,
}

impl CookieAuthenticator {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for bad login URL patterns.
    pub fn new(
        config: CookieAuthenticatorConfig,
        identifier: Arc<dyn Identifier>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            login_url: UrlMatcher::new(config.login_url.to_vec(), &config.url_checker)?,
            cookie: config.cookie,
            remember_me_field: config.remember_me_field,
            fields: config.fields,
            identifier,
            hasher,
        })
    }

    fn token_input(&self, identity: &IdentityData) -> Option<(String, String)> {
        let username = identity.get_str(&self.fields.username)?;
        let digest = identity.get_str(&self.fields.password)?;
        let input = format!("{username}{digest}");
        Some((username, input))
    }

    /// Cookie payload for `identity`, or `None` when it lacks the username or
    /// password digest.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when hashing fails.
    pub fn create_token(&self, identity: &IdentityData) -> Result<Option<String>, Error> {
        let Some((username, input)) = self.token_input(identity) else {
            return Ok(None);
        };
        let hash = self.hasher.hash(&input).map_err(Error::Backend)?;
        Ok(Some(Value::from(vec![username, hash]).to_string()))
    }

    /// Recompute the token from the identity's current password digest.
    #[must_use]
    pub fn check_token(&self, identity: &IdentityData, token_hash: &str) -> bool {
        self.token_input(identity)
            .is_some_and(|(_, input)| self.hasher.check(&input, token_hash))
    }

    fn remember_me(&self, request: &Request) -> bool {
        match request.body_field(&self.remember_me_field) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(flag)) => !flag.is_empty() && flag != "0",
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(fields)) => !fields.is_empty(),
        }
    }

    fn lookup(&self, username: &str) -> Result<Option<IdentityData>, Error> {
        let credentials = Credentials::new().with(CREDENTIAL_USERNAME, username);
        Ok(self.identifier.lookup(&credentials)?.into_identity())
    }
}

fn parse_payload(raw: &str) -> Option<(String, String)> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return None;
    };
    match items.as_slice() {
        [Value::String(username), Value::String(token_hash)]
            if !username.is_empty() && !token_hash.is_empty() =>
        {
            Some((username.clone(), token_hash.clone()))
        }
        _ => None,
    }
}

impl Authenticator for CookieAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<AuthResult, Error> {
        let Some(raw) = request
            .cookie(&self.cookie.name)
            .filter(|raw| !raw.is_empty())
        else {
            return Ok(credentials_missing("Login credentials not found"));
        };
        let Some((username, token_hash)) = parse_payload(&raw) else {
            return Ok(AuthResult::failure(
                Status::CredentialsInvalid,
                vec!["Cookie token is invalid.".to_string()],
            ));
        };

        let identification = self
            .identifier
            .identify(&Credentials::new().with(CREDENTIAL_USERNAME, username))?;
        let errors = identification.errors().to_vec();
        let Some(identity) = identification.into_identity() else {
            return Ok(AuthResult::failure(Status::IdentityNotFound, errors));
        };

        if !self.check_token(&identity, &token_hash) {
            debug!(cookie = %self.cookie.name, "remember-me token does not match");
            return Ok(AuthResult::failure(
                Status::CredentialsInvalid,
                vec!["Cookie token does not match".to_string()],
            ));
        }
        Ok(AuthResult::success(identity.without(&self.fields.password))?)
    }

    fn as_persistence(&self) -> Option<&dyn Persistence> {
        Some(self)
    }
}

impl Persistence for CookieAuthenticator {
    fn persist_identity(
        &self,
        request: Request,
        response: Response,
        identity: &IdentityData,
    ) -> Result<(Request, Response), Error> {
        if !self.remember_me(&request) || !self.login_url.matches(&request) {
            return Ok((request, response));
        }

        // Identifiers strip the digest from login results; fetch the stored record.
        let identity = if identity.contains(&self.fields.password) {
            Some(identity.clone())
        } else {
            match identity.get_str(&self.fields.username) {
                Some(username) => self.lookup(&username)?,
                None => None,
            }
        };
        let token = match identity {
            Some(identity) => self.create_token(&identity)?,
            None => None,
        };
        let Some(token) = token else {
            warn!(cookie = %self.cookie.name, "identity lacks the fields a remember-me token needs");
            return Ok((request, response));
        };

        let cookie = Cookie::new(&self.cookie.name, token)
            .with_max_age(self.cookie.max_age)
            .with_path(&self.cookie.path)
            .with_domain(self.cookie.domain.clone())
            .with_secure(self.cookie.secure)
            .with_http_only(self.cookie.http_only)
            .with_same_site(self.cookie.same_site.clone());
        Ok((request, response.with_cookie(&cookie)?))
    }

    fn clear_identity(
        &self,
        request: Request,
        response: Response,
    ) -> Result<(Request, Response), Error> {
        let cookie = Cookie::expired(&self.cookie.name)
            .with_path(&self.cookie.path)
            .with_domain(self.cookie.domain.clone())
            .with_secure(self.cookie.secure)
            .with_http_only(self.cookie.http_only);
        Ok((request, response.with_cookie(&cookie)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authenticator::testing::SpyIdentifier;
    use crate::hasher::Argon2Hasher;
    use crate::identifier::{IdentifierCollection, PasswordIdentifier};
    use crate::identity::Fields;
    use crate::resolver::MemoryResolver;
    use argon2::Params;
    use http::{header::COOKIE, HeaderValue, Method, Uri};
    use serde_json::json;

    struct Fixture {
        authenticator: CookieAuthenticator,
        hasher: Arc<Argon2Hasher>,
        record: IdentityData,
    }

    fn fixture(config: CookieAuthenticatorConfig) -> Fixture {
        let hasher = Arc::new(Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap()));
        let digest = hasher.hash("password").unwrap();
        let fields: Fields = match json!({"id": 1, "username": "mariano", "password": digest}) {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        };
        let record = IdentityData::Fields(fields.clone());
        let resolver = Arc::new(MemoryResolver::new(vec![fields]));
        let identifier = Arc::new(PasswordIdentifier::new(
            Default::default(),
            resolver,
            hasher.clone(),
        ));
        Fixture {
            authenticator: CookieAuthenticator::new(config, identifier, hasher.clone()).unwrap(),
            hasher,
            record,
        }
    }

    fn with_cookie(value: &str) -> Request {
        let cookie = Cookie::new("CookieAuth", value).to_header_value();
        let pair = cookie.split(';').next().unwrap().to_string();
        Request::new(Method::GET, Uri::from_static("/"))
            .with_header(COOKIE, HeaderValue::from_str(&pair).unwrap())
    }

    #[test]
    fn token_checks_against_the_current_digest() {
        let fixture = fixture(CookieAuthenticatorConfig::default());
        let token = fixture.authenticator.create_token(&fixture.record).unwrap().unwrap();
        let Value::Array(items) = serde_json::from_str::<Value>(&token).unwrap() else {
            panic!("token is not an array");
        };
        let hash = items[1].as_str().unwrap();
        assert!(fixture.authenticator.check_token(&fixture.record, hash));

        let rotated = fixture.hasher.hash("new password").unwrap();
        let mut fields = fixture.record.to_fields();
        fields.insert("password".into(), json!(rotated));
        assert!(!fixture
            .authenticator
            .check_token(&IdentityData::Fields(fields), hash));
    }

    #[test]
    fn valid_cookie_authenticates_without_exposing_the_digest() {
        let fixture = fixture(CookieAuthenticatorConfig::default());
        let token = fixture.authenticator.create_token(&fixture.record).unwrap().unwrap();
        let result = fixture.authenticator.authenticate(&with_cookie(&token)).unwrap();
        assert!(result.is_valid());
        assert!(result.data().is_some_and(|d| !d.contains("password")));
    }

    #[test]
    fn cookie_failures() {
        let fixture = fixture(CookieAuthenticatorConfig::default());
        let missing = fixture
            .authenticator
            .authenticate(&Request::new(Method::GET, Uri::from_static("/")))
            .unwrap();
        assert_eq!(missing.status(), Status::CredentialsMissing);

        for payload in ["not json", "[\"mariano\"]", "[\"a\",\"b\",\"c\"]", "{\"a\":1}"] {
            let result = fixture.authenticator.authenticate(&with_cookie(payload)).unwrap();
            assert_eq!(result.status(), Status::CredentialsInvalid, "{payload}");
        }

        let unknown = fixture
            .authenticator
            .authenticate(&with_cookie("[\"larry\",\"$argon2id$x\"]"))
            .unwrap();
        assert_eq!(unknown.status(), Status::IdentityNotFound);

        let forged = fixture
            .authenticator
            .authenticate(&with_cookie("[\"mariano\",\"$argon2id$x\"]"))
            .unwrap();
        assert_eq!(forged.status(), Status::CredentialsInvalid);
        assert_eq!(forged.errors(), ["Cookie token does not match"]);
    }

    #[test]
    fn empty_cookie_fields_never_reach_the_identifier() {
        let hasher = Arc::new(Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap()));
        let spy = Arc::new(SpyIdentifier::returning(json!({"id": 1, "username": ""})));
        let authenticator =
            CookieAuthenticator::new(CookieAuthenticatorConfig::default(), spy.clone(), hasher)
                .unwrap();

        for payload in ["[\"\",\"$argon2id$x\"]", "[\"mariano\",\"\"]"] {
            let result = authenticator.authenticate(&with_cookie(payload)).unwrap();
            assert_eq!(result.status(), Status::CredentialsInvalid, "{payload}");
        }
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn persist_lookup_keeps_the_login_attempt() {
        let fixture = fixture(CookieAuthenticatorConfig::default());
        let resolver = Arc::new(MemoryResolver::new(vec![fixture.record.to_fields()]));
        let mut collection = IdentifierCollection::new();
        collection
            .register(
                "Password",
                Arc::new(PasswordIdentifier::new(
                    Default::default(),
                    resolver,
                    fixture.hasher.clone(),
                )),
            )
            .unwrap();
        let collection = Arc::new(collection);
        let authenticator = CookieAuthenticator::new(
            CookieAuthenticatorConfig::default(),
            collection.clone(),
            fixture.hasher.clone(),
        )
        .unwrap();

        let failed = collection
            .identify(
                &Credentials::new()
                    .with(CREDENTIAL_USERNAME, "mariano")
                    .with("password", "wrong"),
            )
            .unwrap();
        assert!(!failed.is_found());

        let request = Request::new(Method::POST, Uri::from_static("/"))
            .with_body_field("remember_me", true);
        let stripped = fixture.record.clone().without("password");
        let (_, response) = authenticator
            .persist_identity(request, Response::new(), &stripped)
            .unwrap();
        assert_eq!(response.set_cookies().len(), 1);
        assert_eq!(collection.successful_identifier(), None);
    }

    #[test]
    fn persist_requires_remember_me_and_login_url() {
        let config = CookieAuthenticatorConfig {
            login_url: StringList::from("/users/login"),
            cookie: CookieOptions {
                http_only: true,
                max_age: Some(3600),
                ..CookieOptions::default()
            },
            ..CookieAuthenticatorConfig::default()
        };
        let fixture = fixture(config);
        let stripped = fixture.record.clone().without("password");

        let login = Request::new(Method::POST, Uri::from_static("/users/login"));
        let (_, response) = fixture
            .authenticator
            .persist_identity(login.clone(), Response::new(), &stripped)
            .unwrap();
        assert!(response.set_cookies().is_empty());

        let remembered = login.with_body_field("remember_me", "1");
        let (_, response) = fixture
            .authenticator
            .persist_identity(remembered.clone(), Response::new(), &stripped)
            .unwrap();
        let cookies = response.set_cookies();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("CookieAuth=%5B%22mariano%22"));
        assert!(cookies[0].contains("Max-Age=3600"));
        assert!(cookies[0].contains("HttpOnly"));

        let elsewhere = Request::new(Method::POST, Uri::from_static("/home"))
            .with_body_field("remember_me", true);
        let (_, response) = fixture
            .authenticator
            .persist_identity(elsewhere, Response::new(), &stripped)
            .unwrap();
        assert!(response.set_cookies().is_empty());
    }

    #[test]
    fn clear_expires_the_cookie() {
        let fixture = fixture(CookieAuthenticatorConfig::default());
        let (_, response) = fixture
            .authenticator
            .clear_identity(Request::new(Method::GET, Uri::from_static("/")), Response::new())
            .unwrap();
        assert_eq!(
            response.set_cookies(),
            vec!["CookieAuth=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"]
        );
    }
}
