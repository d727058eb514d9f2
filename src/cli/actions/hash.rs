use crate::authenticator::HttpDigestAuthenticator;
use crate::hasher::{Argon2Hasher, PasswordHasher};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct HashArgs {
    pub password: SecretString,
}

#[derive(Debug)]
pub struct DigestArgs {
    pub username: String,
    pub password: SecretString,
    pub realm: String,
}

/// Print an Argon2id PHC string for the password.
/// # Errors
/// Returns an error if hashing fails.
pub fn password(args: &HashArgs) -> Result<()> {
    let digest = Argon2Hasher::new()
        .hash(args.password.expose_secret())
        .map_err(|err| anyhow!(err))?;
    println!("{digest}");
    Ok(())
}

/// Print the HA1 value to store as the digest user's password.
/// # Errors
/// Never fails; kept fallible for the action interface.
pub fn digest(args: &DigestArgs) -> Result<()> {
    println!(
        "{}",
        HttpDigestAuthenticator::password(
            &args.username,
            args.password.expose_secret(),
            &args.realm
        )
    );
    Ok(())
}
