//! Bearer token decoding for the JWT and PASETO authenticators.

mod jwt;
mod paseto;

pub use jwt::JwtDecoder;
pub use paseto::{PasetoDecoder, PasetoPurpose};

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Decoded token claims, in token order.
pub type Claims = Map<String, Value>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid expiration")]
    InvalidExp,
    #[error("invalid not-before")]
    InvalidNbf,
    #[error("claims are not a json object")]
    NotAnObject,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Verifies a bearer token and yields its claims.
pub trait TokenDecoder: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns a [`TokenError`] when the token is malformed, forged or outside
    /// its validity window.
    fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}
