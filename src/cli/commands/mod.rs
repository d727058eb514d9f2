pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("gatehouse")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("paseto")
                .about("Generate v4 PASETO key material (base64url)")
                .arg(
                    Arg::new("purpose")
                        .help("Token purpose")
                        .value_parser(["local", "public"])
                        .default_value("local"),
                ),
        )
        .subcommand(
            Command::new("secret")
                .about("Generate a random secret for digest nonces or HMAC JWTs")
                .arg(
                    Arg::new("bytes")
                        .long("bytes")
                        .help("Number of random bytes")
                        .default_value("32")
                        .value_parser(clap::value_parser!(u16).range(16..=1024)),
                ),
        )
        .subcommand(
            Command::new("hash")
                .about("Hash a password with the default hasher")
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password to hash")
                        .env("GATEHOUSE_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("digest-password")
                .about("Compute the HA1 value stored for HTTP Digest users")
                .arg(Arg::new("username").long("username").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("GATEHOUSE_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new("realm")
                        .long("realm")
                        .env("GATEHOUSE_REALM")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Build a service from a JSON config and list its components")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to the service config")
                        .env("GATEHOUSE_CONFIG")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        );

    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "gatehouse");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            env!("CARGO_PKG_DESCRIPTION")
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_paseto_default_purpose() {
        let matches = new().get_matches_from(vec!["gatehouse", "paseto"]);
        let sub = matches.subcommand_matches("paseto").unwrap();
        assert_eq!(
            sub.get_one::<String>("purpose").map(String::as_str),
            Some("local")
        );
    }

    #[test]
    fn test_secret_bytes_range() {
        let result = new().try_get_matches_from(vec!["gatehouse", "secret", "--bytes", "8"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("GATEHOUSE_PASSWORD", Some("hunter2")),
                ("GATEHOUSE_REALM", Some("api")),
                ("GATEHOUSE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches =
                    new().get_matches_from(vec!["gatehouse", "digest-password", "--username", "mariano"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                let sub = matches.subcommand_matches("digest-password").unwrap();
                assert_eq!(
                    sub.get_one::<String>("password").map(String::as_str),
                    Some("hunter2")
                );
                assert_eq!(sub.get_one::<String>("realm").map(String::as_str), Some("api"));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("GATEHOUSE_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["gatehouse", "secret"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars([("GATEHOUSE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["gatehouse".to_string(), "secret".to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }
                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_hash_requires_password() {
        temp_env::with_vars([("GATEHOUSE_PASSWORD", None::<String>)], || {
            assert!(new().try_get_matches_from(vec!["gatehouse", "hash"]).is_err());
        });
    }
}
