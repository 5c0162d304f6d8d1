use super::validator_cookie_name;
use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::{Arg, ArgMatches, Command};

pub const ARG_CSRF_COOKIE_NAME: &str = "csrf-cookie-name";
pub const ARG_CSRF_HEADER_NAME: &str = "csrf-header-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub cookie_name: String,
    pub header_name: HeaderName,
}

impl Options {
    /// Parse CSRF arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the header name is not a valid HTTP header name.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let cookie_name = matches
            .get_one::<String>(ARG_CSRF_COOKIE_NAME)
            .cloned()
            .unwrap_or_else(|| "sentinel_csrf".to_string());
        let header = matches
            .get_one::<String>(ARG_CSRF_HEADER_NAME)
            .map_or("X-CSRF-Token", String::as_str);
        let header_name = HeaderName::from_bytes(header.trim().as_bytes())
            .with_context(|| format!("invalid --{ARG_CSRF_HEADER_NAME}: {header}"))?;

        Ok(Self {
            cookie_name,
            header_name,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CSRF_COOKIE_NAME)
                .long(ARG_CSRF_COOKIE_NAME)
                .help("CSRF token cookie name")
                .env("SENTINEL_CSRF_COOKIE_NAME")
                .default_value("sentinel_csrf")
                .value_parser(validator_cookie_name()),
        )
        .arg(
            Arg::new(ARG_CSRF_HEADER_NAME)
                .long(ARG_CSRF_HEADER_NAME)
                .help("Request header echoing the CSRF token on unsafe methods")
                .env("SENTINEL_CSRF_HEADER_NAME")
                .default_value("X-CSRF-Token"),
        )
}
