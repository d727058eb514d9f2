use super::{Claims, TokenDecoder, TokenError};
use crate::error::ConfigError;
use base64ct::{Base64UrlUnpadded, Encoding};
use pasetors::errors::Error as PasetorsError;
use pasetors::keys::{AsymmetricPublicKey, SymmetricKey};
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, PublicToken, V4};
use pasetors::{Local, Public};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const COMPONENT: &str = "Paseto";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasetoPurpose {
    Local,
    Public,
}

impl PasetoPurpose {
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for anything but `local` or `public`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "local" => Ok(Self::Local),
            "public" => Ok(Self::Public),
            other => Err(ConfigError::Unsupported {
                component: COMPONENT,
                key: "purpose",
                value: other.to_string(),
            }),
        }
    }
}

enum Key {
    Local(SymmetricKey<V4>),
    Public(AsymmetricPublicKey<V4>),
}

/// `v4.local` / `v4.public` token verification.
///
/// Keys are given as PASERK (`k4.local.`, `k4.public.`) or as raw base64url
/// bytes. `exp`/`nbf` (RFC 3339) are enforced when present and a JSON footer
/// is exposed under the `footer` claim.
pub struct PasetoDecoder {
    key: Key,
}

impl PasetoDecoder {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for versions other than `v4` or unusable key material.
    pub fn new(
        version: &str,
        purpose: PasetoPurpose,
        key: &SecretString,
    ) -> Result<Self, ConfigError> {
        if version != "v4" {
            return Err(ConfigError::Unsupported {
                component: COMPONENT,
                key: "version",
                value: version.to_string(),
            });
        }
        let material = key.expose_secret();
        let invalid = |err: PasetorsError| ConfigError::InvalidKey {
            component: COMPONENT,
            reason: err.to_string(),
        };
        let key = match purpose {
            PasetoPurpose::Local if material.starts_with("k4.local.") => {
                Key::Local(SymmetricKey::<V4>::try_from(material).map_err(invalid)?)
            }
            PasetoPurpose::Local => {
                Key::Local(SymmetricKey::<V4>::from(&raw_key(material)?).map_err(invalid)?)
            }
            PasetoPurpose::Public if material.starts_with("k4.public.") => {
                Key::Public(AsymmetricPublicKey::<V4>::try_from(material).map_err(invalid)?)
            }
            PasetoPurpose::Public => Key::Public(
                AsymmetricPublicKey::<V4>::from(&raw_key(material)?).map_err(invalid)?,
            ),
        };
        Ok(Self { key })
    }

    /// Decode with an explicit clock, in unix seconds.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] when verification or the time claims fail.
    pub fn decode_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (payload, footer) = match &self.key {
            Key::Local(key) => {
                let untrusted =
                    UntrustedToken::<Local, V4>::try_from(token).map_err(|err| map_error(&err))?;
                let trusted = LocalToken::decrypt(key, &untrusted, None, None)
                    .map_err(|err| map_error(&err))?;
                (trusted.payload().to_string(), trusted.footer().to_vec())
            }
            Key::Public(key) => {
                let untrusted =
                    UntrustedToken::<Public, V4>::try_from(token).map_err(|err| map_error(&err))?;
                let trusted = PublicToken::verify(key, &untrusted, None, None)
                    .map_err(|err| map_error(&err))?;
                (trusted.payload().to_string(), trusted.footer().to_vec())
            }
        };

        let Value::Object(mut claims) = serde_json::from_str::<Value>(&payload)? else {
            return Err(TokenError::NotAnObject);
        };
        validate_times(&claims, now)?;
        if let Ok(Value::Object(footer)) = serde_json::from_slice::<Value>(&footer) {
            claims.insert("footer".to_string(), Value::Object(footer));
        }
        Ok(claims)
    }
}

impl fmt::Debug for PasetoDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let purpose = match self.key {
            Key::Local(_) => PasetoPurpose::Local,
            Key::Public(_) => PasetoPurpose::Public,
        };
        f.debug_struct("PasetoDecoder")
            .field("version", &"v4")
            .field("purpose", &purpose)
            .finish()
    }
}

impl TokenDecoder for PasetoDecoder {
    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }
}

fn raw_key(material: &str) -> Result<Vec<u8>, ConfigError> {
    Base64UrlUnpadded::decode_vec(material.trim_end_matches('=')).map_err(|_| {
        ConfigError::InvalidKey {
            component: COMPONENT,
            reason: "key is neither PASERK nor base64url".to_string(),
        }
    })
}

fn unix_from_claim(claims: &Claims, name: &str) -> Option<Result<i64, ()>> {
    let value = claims.get(name)?;
    Some(
        value
            .as_str()
            .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
            .map(OffsetDateTime::unix_timestamp)
            .ok_or(()),
    )
}

fn validate_times(claims: &Claims, now: i64) -> Result<(), TokenError> {
    if let Some(exp) = unix_from_claim(claims, "exp") {
        let exp = exp.map_err(|()| TokenError::InvalidExp)?;
        if exp <= now {
            return Err(TokenError::Expired);
        }
    }
    if let Some(nbf) = unix_from_claim(claims, "nbf") {
        let nbf = nbf.map_err(|()| TokenError::InvalidNbf)?;
        if nbf > now {
            return Err(TokenError::NotYetValid);
        }
    }
    Ok(())
}

fn map_error(err: &PasetorsError) -> TokenError {
    match err {
        PasetorsError::TokenValidation => TokenError::InvalidSignature,
        _ => TokenError::TokenFormat,
    }
}
