//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments into option groups and maps them to an
//! action. Nothing here touches the network or the key material.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{authenticator, console, csrf, session};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let console = console::Options::parse(matches)?;
    let session = session::Options::parse(matches)?;
    let csrf = csrf::Options::parse(matches)?;
    let authenticator = authenticator::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        console,
        session,
        csrf,
        authenticator,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV: [&str; 6] = [
        "SENTINEL_PORT",
        "SENTINEL_BASE_PATH",
        "SENTINEL_LOGIN_PATH",
        "SENTINEL_AUTHENTICATOR_URL",
        "SENTINEL_SESSION_HASH_KEY",
        "SENTINEL_SESSION_BLOCK_KEY",
    ];

    #[test]
    fn authenticator_url_required() {
        temp_env::with_vars(ENV.map(|name| (name, None::<&str>)), || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec!["sentinel", "--insecure-ephemeral-keys"]);
            let result = handler(&matches);
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
    fn server_action() -> Result<()> {
        temp_env::with_vars(ENV.map(|name| (name, None::<&str>)), || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "sentinel",
                "--port",
                "9000",
                "--base-path",
                "/admin",
                "--authenticator-url",
                "http://127.0.0.1:9999",
                "--insecure-ephemeral-keys",
            ]);

            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.port, 9000);
            assert_eq!(args.console.base_path, "/admin");
            assert_eq!(args.authenticator.url, "http://127.0.0.1:9999");
            assert!(args.session.ephemeral_keys);
            Ok(())
        })
    }
}
