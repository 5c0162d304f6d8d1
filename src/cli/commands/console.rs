use super::validator_cookie_name;
use clap::{Arg, ArgMatches, Command};

pub const ARG_BASE_PATH: &str = "base-path";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_AUTH_COOKIE_NAME: &str = "auth-cookie-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_path: String,
    pub login_path: Option<String>,
    pub auth_cookie_name: String,
}

impl Options {
    /// Parse console arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a path is not absolute.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let base_path = matches
            .get_one::<String>(ARG_BASE_PATH)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "/".to_string());
        if !base_path.starts_with('/') {
            anyhow::bail!("--{ARG_BASE_PATH} must start with '/': {base_path}");
        }

        let login_path = matches
            .get_one::<String>(ARG_LOGIN_PATH)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if let Some(path) = login_path.as_deref().filter(|path| !path.starts_with('/')) {
            anyhow::bail!("--{ARG_LOGIN_PATH} must start with '/': {path}");
        }

        let auth_cookie_name = matches
            .get_one::<String>(ARG_AUTH_COOKIE_NAME)
            .cloned()
            .unwrap_or_else(|| "Authorization".to_string());

        Ok(Self {
            base_path,
            login_path,
            auth_cookie_name,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_PATH)
                .long(ARG_BASE_PATH)
                .help("Path the console is mounted at")
                .env("SENTINEL_BASE_PATH")
                .default_value("/"),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Login page path, must live under the base path (default: <base-path>/login)")
                .env("SENTINEL_LOGIN_PATH"),
        )
        .arg(
            Arg::new(ARG_AUTH_COOKIE_NAME)
                .long(ARG_AUTH_COOKIE_NAME)
                .help("Name of the cookie carrying the bearer credential")
                .env("SENTINEL_AUTH_COOKIE_NAME")
                .default_value("Authorization")
                .value_parser(validator_cookie_name()),
        )
}
