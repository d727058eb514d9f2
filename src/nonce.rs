//! Self-verifying, time-bounded Digest nonces.
//!
//! Wire format: `base64(expiry ":" hex(HMAC-SHA1(key = secret, expiry ":" secret)))`
//! with `expiry` in unix seconds. Nothing is stored server side.

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce is not valid base64 `expiry:signature`")]
    Malformed,
    #[error("nonce expired")]
    Expired,
    #[error("nonce signature mismatch")]
    BadSignature,
    #[error("nonce secret can not key the signature")]
    InvalidSecret,
}

fn signature(secret: &str, expires_at: i64) -> Result<String, NonceError> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| NonceError::InvalidSecret)?;
    mac.update(format!("{expires_at}:{secret}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Issue a nonce valid until `expires_at` (unix seconds).
///
/// # Errors
///
/// Returns [`NonceError::InvalidSecret`] when the secret can not key the MAC.
pub fn generate(secret: &str, expires_at: i64) -> Result<String, NonceError> {
    let signature = signature(secret, expires_at)?;
    Ok(Base64::encode_string(
        format!("{expires_at}:{signature}").as_bytes(),
    ))
}

/// Check a presented nonce at `now` (unix seconds).
///
/// # Errors
///
/// Returns why the nonce was rejected.
pub fn validate(nonce: &str, secret: &str, now: i64) -> Result<(), NonceError> {
    let decoded = Base64::decode_vec(nonce).map_err(|_| NonceError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| NonceError::Malformed)?;
    let (expiry, presented) = decoded.split_once(':').ok_or(NonceError::Malformed)?;
    let expires_at: i64 = expiry.parse().map_err(|_| NonceError::Malformed)?;

    let expected = signature(secret, expires_at)?;
    if !bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        return Err(NonceError::BadSignature);
    }
    if expires_at <= now {
        return Err(NonceError::Expired);
    }
    Ok(())
}
