use crate::cli::actions::{check, hash, keys, Action};
use crate::token::PasetoPurpose;
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Turn parsed arguments into an [`Action`].
/// # Errors
/// Returns an error if a required argument is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("paseto", sub_m)) => {
            let purpose = sub_m
                .get_one::<String>("purpose")
                .map_or("local", String::as_str);
            Ok(Action::Paseto(keys::PasetoArgs {
                purpose: PasetoPurpose::parse(purpose)?,
            }))
        }
        Some(("secret", sub_m)) => Ok(Action::Secret(keys::SecretArgs {
            bytes: usize::from(sub_m.get_one::<u16>("bytes").copied().unwrap_or(32)),
        })),
        Some(("hash", sub_m)) => Ok(Action::Hash(hash::HashArgs {
            password: secret(sub_m, "password")?,
        })),
        Some(("digest-password", sub_m)) => Ok(Action::DigestPassword(hash::DigestArgs {
            username: string(sub_m, "username")?,
            password: secret(sub_m, "password")?,
            realm: string(sub_m, "realm")?,
        })),
        Some(("check", sub_m)) => Ok(Action::Check(check::Args {
            config: sub_m
                .get_one::<PathBuf>("config")
                .cloned()
                .context("missing required argument: --config")?,
        })),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn string(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{name}"))
}

fn secret(matches: &clap::ArgMatches, name: &str) -> Result<SecretString> {
    string(matches, name).map(SecretString::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn dispatch_paseto_public() {
        let matches = commands::new().get_matches_from(vec!["gatehouse", "paseto", "public"]);
        let action = handler(&matches).unwrap();
        assert!(matches!(
            action,
            Action::Paseto(keys::PasetoArgs {
                purpose: PasetoPurpose::Public
            })
        ));
    }

    #[test]
    fn dispatch_check() {
        temp_env::with_vars([("GATEHOUSE_CONFIG", Some("/etc/gatehouse.json"))], || {
            let matches = commands::new().get_matches_from(vec!["gatehouse", "check"]);
            let action = handler(&matches).unwrap();
            match action {
                Action::Check(args) => {
                    assert_eq!(args.config, PathBuf::from("/etc/gatehouse.json"));
                }
                other => panic!("unexpected action {other:?}"),
            }
        });
    }

    #[test]
    fn dispatch_secret_default_bytes() {
        let matches = commands::new().get_matches_from(vec!["gatehouse", "secret"]);
        assert!(matches!(
            handler(&matches).unwrap(),
            Action::Secret(keys::SecretArgs { bytes: 32 })
        ));
    }
}
