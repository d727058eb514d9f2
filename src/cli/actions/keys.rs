use crate::token::PasetoPurpose;
use anyhow::{anyhow, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use pasetors::keys::{AsymmetricKeyPair, Generate, SymmetricKey};
use pasetors::version4::V4;
use rand::{rngs::OsRng, RngCore};
use tracing::debug;

#[derive(Debug)]
pub struct PasetoArgs {
    pub purpose: PasetoPurpose,
}

#[derive(Debug)]
pub struct SecretArgs {
    pub bytes: usize,
}

/// Print fresh v4 key material as `name=value` lines.
/// # Errors
/// Returns an error if the key can not be generated.
pub fn paseto(args: &PasetoArgs) -> Result<()> {
    for (name, value) in paseto_keys(args.purpose)? {
        println!("{name}={value}");
    }
    Ok(())
}

fn paseto_keys(purpose: PasetoPurpose) -> Result<Vec<(&'static str, String)>> {
    debug!(?purpose, "generating PASETO key material");
    match purpose {
        PasetoPurpose::Local => {
            let key = SymmetricKey::<V4>::generate().map_err(|err| anyhow!(err))?;
            Ok(vec![("secretKey", Base64UrlUnpadded::encode_string(key.as_bytes()))])
        }
        PasetoPurpose::Public => {
            let pair = AsymmetricKeyPair::<V4>::generate().map_err(|err| anyhow!(err))?;
            Ok(vec![
                (
                    "secretKey",
                    Base64UrlUnpadded::encode_string(pair.public.as_bytes()),
                ),
                (
                    "signingKey",
                    Base64UrlUnpadded::encode_string(pair.secret.as_bytes()),
                ),
            ])
        }
    }
}

/// Print a random hex secret.
/// # Errors
/// Returns an error if the OS random source fails.
pub fn secret(args: &SecretArgs) -> Result<()> {
    println!("{}", random_hex(args.bytes)?);
    Ok(())
}

fn random_hex(bytes: usize) -> Result<String> {
    let mut buffer = vec![0_u8; bytes];
    OsRng.try_fill_bytes(&mut buffer)?;
    Ok(hex::encode(buffer))
}
