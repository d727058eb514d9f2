use super::{Claims, TokenDecoder, TokenError};
use crate::error::ConfigError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const COMPONENT: &str = "Jwt";

/// JWS verification with a shared secret (`HS*`) or an RSA public key (`RS*`).
///
/// `exp` and `nbf` are enforced when the token carries them.
#[derive(Clone)]
pub struct JwtDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl JwtDecoder {
    /// `key` is the shared secret for `HS*` algorithms and a PEM encoded public
    /// key for `RS*`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unknown algorithms or unusable key material.
    pub fn new(algorithm: &str, key: &SecretString) -> Result<Self, ConfigError> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|_| ConfigError::Unsupported {
            component: COMPONENT,
            key: "algorithm",
            value: algorithm.to_string(),
        })?;
        let material = key.expose_secret().as_bytes();
        if material.is_empty() {
            return Err(ConfigError::Missing {
                component: COMPONENT,
                key: "secretKey",
            });
        }
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(material)
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                DecodingKey::from_rsa_pem(material).map_err(|err| ConfigError::InvalidKey {
                    component: COMPONENT,
                    reason: err.to_string(),
                })?
            }
            other => {
                return Err(ConfigError::Unsupported {
                    component: COMPONENT,
                    key: "algorithm",
                    value: format!("{other:?}"),
                })
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        Ok(Self { key, validation })
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<&str>) -> Self {
        if let Some(issuer) = issuer {
            self.validation.set_issuer(&[issuer]);
        }
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Option<&str>) -> Self {
        if let Some(audience) = audience {
            self.validation.set_audience(&[audience]);
            self.validation.validate_aud = true;
        }
        self
    }

    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }
}

impl fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenDecoder for JwtDecoder {
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use time::OffsetDateTime;

    const SECRET: &str = "a-string-secret-at-least-256-bits-long";

    fn sign(claims: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn decoder() -> JwtDecoder {
        JwtDecoder::new("HS256", &SecretString::from(SECRET.to_string())).unwrap()
    }

    #[test]
    fn decodes_claims_without_registered_claims() {
        let token = sign(&json!({"sub": "3", "firstname": "larry"}));
        let claims = decoder().decode(&token).unwrap();
        assert_eq!(claims.get("sub"), Some(&json!("3")));
        assert_eq!(claims.get("firstname"), Some(&json!("larry")));
    }

    #[test]
    fn rejects_expired_and_forged_tokens() {
        let past = OffsetDateTime::now_utc().unix_timestamp() - 600;
        let expired = sign(&json!({"sub": "3", "exp": past}));
        assert!(matches!(decoder().decode(&expired), Err(TokenError::Jwt(_))));

        let other = JwtDecoder::new("HS256", &SecretString::from("another-secret".to_string())).unwrap();
        let token = sign(&json!({"sub": "3"}));
        assert!(other.decode(&token).is_err());
        assert!(decoder().decode("not.a.token").is_err());
    }

    #[test]
    fn audience_is_checked_when_configured() {
        let token = sign(&json!({"sub": "3", "aud": "billing"}));
        let decoder = decoder().with_audience(Some("gatehouse"));
        assert!(decoder.decode(&token).is_err());
        let decoder = self::decoder().with_audience(Some("billing"));
        assert!(decoder.decode(&token).is_ok());
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let err = JwtDecoder::new("XS999", &SecretString::from(SECRET.to_string()));
        assert!(matches!(err, Err(ConfigError::Unsupported { .. })));
        let err = JwtDecoder::new("HS256", &SecretString::from(String::new()));
        assert!(matches!(err, Err(ConfigError::Missing { .. })));
    }
}
