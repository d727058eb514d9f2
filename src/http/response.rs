use crate::http::Cookie;
use http::{
    header::{HeaderName, InvalidHeaderValue, SET_COOKIE},
    HeaderMap, HeaderValue, StatusCode,
};

/// Outgoing response the persistence capabilities decorate.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace every value of `name`.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a value, keeping the existing ones.
    #[must_use]
    pub fn with_added_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// # Errors
    ///
    /// Returns an error when the rendered cookie is not a valid header value.
    pub fn with_cookie(self, cookie: &Cookie) -> Result<Self, InvalidHeaderValue> {
        let value = HeaderValue::from_str(&cookie.to_header_value())?;
        Ok(self.with_added_header(SET_COOKIE, value))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Every `Set-Cookie` value in insertion order.
    #[must_use]
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// # Errors
    ///
    /// Returns an error when the response can not be assembled.
    pub fn into_http(self) -> Result<http::Response<String>, http::Error> {
        let mut response = http::Response::builder().status(self.status).body(self.body)?;
        *response.headers_mut() = self.headers;
        Ok(response)
    }
}
