use crate::http::Session;
use crate::identity::{Fields, Identity};
use base64ct::{Base64, Encoding};
use http::{header::AUTHORIZATION, header::COOKIE, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::form_urlencoded;

/// Basic auth username, as a web server would expose it.
pub const AUTH_USER: &str = "AUTH_USER";
/// Basic auth password.
pub const AUTH_PW: &str = "AUTH_PW";
/// Raw digest parameters (everything after `Digest `).
pub const AUTH_DIGEST: &str = "AUTH_DIGEST";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
/// Method before any override middleware rewrote it.
pub const ORIGINAL_REQUEST_METHOD: &str = "ORIGINAL_REQUEST_METHOD";
pub const SERVER_NAME: &str = "SERVER_NAME";
/// Host as sent by the client, port included.
pub const HTTP_HOST: &str = "HTTP_HOST";
/// `on` when the request arrived over TLS.
pub const HTTPS: &str = "HTTPS";
pub const REQUEST_URI: &str = "REQUEST_URI";

/// Values the pipeline attaches to a request.
#[derive(Clone, Debug)]
pub enum Attribute {
    Identity(Identity),
    Text(String),
}

/// Owned, immutable-by-convention view of an incoming request.
///
/// Builders consume and return `Self`; nothing mutates a shared request.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Fields,
    server: BTreeMap<String, String>,
    session: Option<Arc<dyn Session>>,
    attributes: BTreeMap<String, Attribute>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut server = BTreeMap::new();
        server.insert(REQUEST_METHOD.to_string(), method.as_str().to_string());
        server.insert(REQUEST_URI.to_string(), request_uri(&uri));
        server.insert(
            SERVER_NAME.to_string(),
            uri.host().unwrap_or("localhost").to_string(),
        );
        if let Some(authority) = uri.authority() {
            server.insert(HTTP_HOST.to_string(), authority.as_str().to_string());
        }
        if uri.scheme() == Some(&http::uri::Scheme::HTTPS) {
            server.insert(HTTPS.to_string(), "on".to_string());
        }
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Fields::new(),
            server,
            session: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Adapt the head of an `http` request.
    ///
    /// `Authorization: Basic` is decoded into [`AUTH_USER`]/[`AUTH_PW`] and
    /// `Authorization: Digest` is exposed as [`AUTH_DIGEST`].
    #[must_use]
    pub fn from_http_parts(parts: &http::request::Parts) -> Self {
        let mut request = Self::new(parts.method.clone(), parts.uri.clone());
        request.headers = parts.headers.clone();

        if let Some(host) = request
            .header_str(http::header::HOST.as_str())
            .map(str::trim)
            .filter(|host| !host.is_empty())
        {
            let host = host.to_string();
            let name = host.split(':').next().unwrap_or_default().to_string();
            if !name.is_empty() {
                request.server.insert(SERVER_NAME.to_string(), name);
            }
            request.server.insert(HTTP_HOST.to_string(), host);
        }

        let forwarded_https = request
            .header_str("x-forwarded-proto")
            .and_then(|proto| proto.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        if forwarded_https {
            request.server.insert(HTTPS.to_string(), "on".to_string());
        }

        if let Some(authorization) = request.header_str(AUTHORIZATION.as_str()) {
            let authorization = authorization.trim().to_string();
            if let Some((username, password)) = decode_basic(&authorization) {
                request.server.insert(AUTH_USER.to_string(), username);
                request.server.insert(AUTH_PW.to_string(), password);
            } else if let Some(digest) = strip_scheme(&authorization, "Digest") {
                request
                    .server
                    .insert(AUTH_DIGEST.to_string(), digest.to_string());
            }
        }
        request
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Fields) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_body_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_server_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    #[must_use]
    pub fn without_attribute(mut self, name: &str) -> Self {
        self.attributes.remove(name);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// `https` when [`HTTPS`] is set to anything but `off`, else `http`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self.server_param(HTTPS) {
            Some(flag) if !flag.is_empty() && !flag.eq_ignore_ascii_case("off") => "https",
            _ => "http",
        }
    }

    /// Absolute URL including scheme, host (with port) and query.
    #[must_use]
    pub fn full_url(&self) -> String {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            return self.uri.to_string();
        }
        let host = self
            .server_param(HTTP_HOST)
            .or_else(|| self.server_param(SERVER_NAME))
            .unwrap_or("localhost");
        format!("{}://{host}{}", self.scheme(), request_uri(&self.uri))
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    #[must_use]
    pub fn body(&self) -> &Fields {
        &self.body
    }

    #[must_use]
    pub fn body_field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Body field, only when it holds a string.
    #[must_use]
    pub fn body_str(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn server_params(&self) -> &BTreeMap<String, String> {
        &self.server
    }

    /// Cookie value from the `Cookie` header, URL-decoded.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| decode_cookie_value(value.trim()))
    }

    #[must_use]
    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn identity(&self, name: &str) -> Option<&Identity> {
        match self.attributes.get(name) {
            Some(Attribute::Identity(identity)) => Some(identity),
            _ => None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("session", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = value.split_once(' ')?;
    head.eq_ignore_ascii_case(scheme).then(|| rest.trim())
}

fn decode_basic(authorization: &str) -> Option<(String, String)> {
    let encoded = strip_scheme(authorization, "Basic")?;
    let decoded = Base64::decode_vec(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

// `form_urlencoded::parse` splits on `&` and the first `=`; rebuild both.
fn decode_cookie_value(raw: &str) -> String {
    raw.split('&')
        .map(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .next()
                .map(|(key, value)| {
                    if segment.contains('=') {
                        format!("{key}={value}")
                    } else {
                        key.into_owned()
                    }
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("&")
}
