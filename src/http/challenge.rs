use http::{header::HeaderName, HeaderValue, StatusCode};

/// A `401` response an authenticator asks the outermost layer to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    headers: Vec<(String, String)>,
    body: String,
}

impl Challenge {
    #[must_use]
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self {
            headers,
            body: String::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Render the challenge as an `http::Response` with status `401`.
    ///
    /// # Errors
    ///
    /// Returns an error when a header name or value is not valid HTTP.
    pub fn to_http_response(&self) -> Result<http::Response<String>, http::Error> {
        let mut builder = http::Response::builder().status(StatusCode::UNAUTHORIZED);
        for (name, value) in &self.headers {
            builder = builder.header(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        builder.body(self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_unauthorized_response() -> Result<(), http::Error> {
        let challenge = Challenge::new(vec![(
            "WWW-Authenticate".to_string(),
            "Basic realm=\"example.com\"".to_string(),
        )])
        .with_body("Authentication is required to continue");

        let response = challenge.to_http_response()?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok()),
            Some("Basic realm=\"example.com\"")
        );
        assert_eq!(response.body(), "Authentication is required to continue");
        Ok(())
    }

    #[test]
    fn header_lookup_ignores_case() {
        let challenge = Challenge::new(vec![("X-Test".to_string(), "1".to_string())]);
        assert_eq!(challenge.header("x-test"), Some("1"));
        assert_eq!(challenge.header("x-other"), None);
    }
}
