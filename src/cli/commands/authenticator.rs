use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_AUTHENTICATOR_URL: &str = "authenticator-url";
pub const ARG_AUTHENTICATOR_TIMEOUT: &str = "authenticator-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub timeout: Duration,
}

impl Options {
    /// Parse authenticator arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the authenticator URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = match matches.get_one::<String>(ARG_AUTHENTICATOR_URL) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_AUTHENTICATOR_URL}"),
        };
        let timeout = matches
            .get_one::<u64>(ARG_AUTHENTICATOR_TIMEOUT)
            .copied()
            .unwrap_or(5);

        Ok(Self {
            url,
            timeout: Duration::from_secs(timeout),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTHENTICATOR_URL)
                .long(ARG_AUTHENTICATOR_URL)
                .help("Base URL of the identity provider verification service")
                .long_help(
                    "Base URL of the identity provider verification service.\n\nCredentials are checked with `POST <url>/verify` and a JSON body `{\"token\": \"...\"}`.",
                )
                .env("SENTINEL_AUTHENTICATOR_URL"),
        )
        .arg(
            Arg::new(ARG_AUTHENTICATOR_TIMEOUT)
                .long(ARG_AUTHENTICATOR_TIMEOUT)
                .help("Give up on the identity provider after this many seconds")
                .env("SENTINEL_AUTHENTICATOR_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        temp_env::with_vars([("SENTINEL_AUTHENTICATOR_URL", None::<&str>)], || {
            let matches = with_args(Command::new("sentinel")).get_matches_from(vec!["sentinel"]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(
                    err.to_string()
                        .contains("missing required argument: --authenticator-url")
                );
            }
        });
    }

    #[test]
    fn url_and_timeout_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("SENTINEL_AUTHENTICATOR_URL", Some("https://idp.example.com/api")),
                ("SENTINEL_AUTHENTICATOR_TIMEOUT_SECONDS", Some("2")),
            ],
            || {
                let matches =
                    with_args(Command::new("sentinel")).get_matches_from(vec!["sentinel"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.url, "https://idp.example.com/api");
                assert_eq!(options.timeout, Duration::from_secs(2));
                Ok(())
            },
        )
    }
}
