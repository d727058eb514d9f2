//! Password hashing seam consumed by the password identifier and the cookie authenticator.

use crate::error::BoxError;
use argon2::{
    password_hash::{PasswordHash, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use std::fmt;
use std::sync::OnceLock;

pub trait PasswordHasher: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the digest can not be computed.
    fn hash(&self, plaintext: &str) -> Result<String, BoxError>;

    /// Constant-cost verification; malformed digests simply fail.
    fn check(&self, plaintext: &str, digest: &str) -> bool;

    fn needs_rehash(&self, digest: &str) -> bool;
}

/// Argon2id PHC-string hasher.
#[derive(Debug)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    dummy: OnceLock<Option<String>>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy: OnceLock::new(),
        }
    }

    // Verified against when the stored digest can not be parsed, so the cost
    // matches a real check.
    fn dummy_hash(&self) -> Option<&str> {
        self.dummy
            .get_or_init(|| self.hash("dummy password").ok())
            .as_deref()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, BoxError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|err| format!("failed to hash password: {err}"))?;
        Ok(hash.to_string())
    }

    fn check(&self, plaintext: &str, digest: &str) -> bool {
        if let Ok(parsed) = PasswordHash::new(digest) {
            return self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok();
        }
        if let Some(parsed) = self.dummy_hash().and_then(|dummy| PasswordHash::new(dummy).ok()) {
            let _ = self.argon2.verify_password(plaintext.as_bytes(), &parsed);
        }
        false
    }

    fn needs_rehash(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        let Ok(params) = Params::try_from(&parsed) else {
            return true;
        };
        let current = self.argon2.params();
        params.m_cost() != current.m_cost()
            || params.t_cost() != current.t_cost()
            || params.p_cost() != current.p_cost()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::with_params(Params::new(8, 1, 1, None).unwrap())
    }

    #[test]
    fn hash_then_check() {
        let hasher = cheap();
        let digest = hasher.hash("password").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.check("password", &digest));
        assert!(!hasher.check("wrong", &digest));
    }

    #[test]
    fn malformed_digest_never_matches() {
        let hasher = cheap();
        assert!(!hasher.check("password", ""));
        assert!(!hasher.check("password", "plain-text"));
    }

    #[test]
    fn rehash_when_params_change() {
        let digest = cheap().hash("password").unwrap();
        assert!(!cheap().needs_rehash(&digest));
        let stronger = Argon2Hasher::with_params(Params::new(16, 2, 1, None).unwrap());
        assert!(stronger.needs_rehash(&digest));
        assert!(cheap().needs_rehash("$2y$10$legacy"));
    }
}
