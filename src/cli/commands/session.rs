use super::validator_cookie_name;
use crate::session::{CookieSecurity, SessionKeys};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, builder::PossibleValuesParser};
use cookie::SameSite;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_SAME_SITE: &str = "cookie-same-site";
pub const ARG_IDLE_TIMEOUT: &str = "session-idle-timeout-seconds";
pub const ARG_LIFETIME: &str = "session-lifetime-seconds";
pub const ARG_REMEMBER_LIFETIME: &str = "session-remember-lifetime-seconds";
pub const ARG_HASH_KEY: &str = "session-hash-key";
pub const ARG_BLOCK_KEY: &str = "session-block-key";
pub const ARG_EPHEMERAL_KEYS: &str = "insecure-ephemeral-keys";

// Ten years.
const MAX_DURATION_SECONDS: u64 = 315_360_000;

#[derive(Debug)]
pub struct Options {
    pub cookie_name: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: CookieSecurity,
    pub same_site: SameSite,
    pub idle_timeout_seconds: u64,
    pub lifetime_seconds: u64,
    pub remember_lifetime_seconds: u64,
    pub hash_key: Option<SecretString>,
    pub block_key: Option<SecretString>,
    pub ephemeral_keys: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value cannot be interpreted.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };
        let seconds = |id: &str| matches.get_one::<u64>(id).copied().unwrap_or_default();

        let cookie_secure = get_non_empty(ARG_COOKIE_SECURE)
            .as_deref()
            .unwrap_or("auto")
            .parse::<CookieSecurity>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let same_site = match get_non_empty(ARG_COOKIE_SAME_SITE).as_deref() {
            Some("strict") => SameSite::Strict,
            Some("none") => SameSite::None,
            _ => SameSite::Lax,
        };

        Ok(Self {
            cookie_name: get_non_empty(ARG_SESSION_COOKIE_NAME)
                .unwrap_or_else(|| "sentinel_session".to_string()),
            cookie_domain: get_non_empty(ARG_COOKIE_DOMAIN),
            cookie_secure,
            same_site,
            idle_timeout_seconds: seconds(ARG_IDLE_TIMEOUT),
            lifetime_seconds: seconds(ARG_LIFETIME),
            remember_lifetime_seconds: seconds(ARG_REMEMBER_LIFETIME),
            hash_key: get_non_empty(ARG_HASH_KEY).map(SecretString::from),
            block_key: get_non_empty(ARG_BLOCK_KEY).map(SecretString::from),
            ephemeral_keys: matches.get_flag(ARG_EPHEMERAL_KEYS),
        })
    }

    /// Session keys from the configured values, or random ones when allowed.
    ///
    /// # Errors
    /// Returns an error if a key is missing, not base64 or has the wrong length.
    pub fn keys(&self) -> Result<SessionKeys> {
        match (&self.hash_key, &self.block_key) {
            (Some(hash), Some(block)) => {
                SessionKeys::from_base64(hash.expose_secret(), block.expose_secret())
                    .context("invalid session keys")
            }
            (None, None) if self.ephemeral_keys => {
                warn!("Using ephemeral session keys: sessions will not survive a restart");
                Ok(SessionKeys::generate())
            }
            (None, None) => anyhow::bail!(
                "missing required arguments: --{ARG_HASH_KEY} and --{ARG_BLOCK_KEY} (or --{ARG_EPHEMERAL_KEYS})"
            ),
            (None, Some(_)) => anyhow::bail!("missing required argument: --{ARG_HASH_KEY}"),
            (Some(_), None) => anyhow::bail!("missing required argument: --{ARG_BLOCK_KEY}"),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_cookie_args(command);
    let command = with_lifetime_args(command);
    with_key_args(command)
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Session cookie name")
                .env("SENTINEL_SESSION_COOKIE_NAME")
                .default_value("sentinel_session")
                .value_parser(validator_cookie_name()),
        )
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Domain attribute for the session, auth and CSRF cookies")
                .env("SENTINEL_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Secure cookie attribute: auto (TLS detection), always or never")
                .env("SENTINEL_COOKIE_SECURE")
                .default_value("auto")
                .value_parser(PossibleValuesParser::new(["auto", "always", "never"])),
        )
        .arg(
            Arg::new(ARG_COOKIE_SAME_SITE)
                .long(ARG_COOKIE_SAME_SITE)
                .help("SameSite policy for the session cookie")
                .env("SENTINEL_COOKIE_SAME_SITE")
                .default_value("lax")
                .value_parser(PossibleValuesParser::new(["lax", "strict", "none"])),
        )
}

fn with_lifetime_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDLE_TIMEOUT)
                .long(ARG_IDLE_TIMEOUT)
                .help("Invalidate a session after this many seconds without a request")
                .env("SENTINEL_SESSION_IDLE_TIMEOUT_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_DURATION_SECONDS)),
        )
        .arg(
            Arg::new(ARG_LIFETIME)
                .long(ARG_LIFETIME)
                .help("Absolute session lifetime in seconds")
                .env("SENTINEL_SESSION_LIFETIME_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_DURATION_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REMEMBER_LIFETIME)
                .long(ARG_REMEMBER_LIFETIME)
                .help("Absolute session lifetime in seconds when \"remember me\" is selected")
                .env("SENTINEL_SESSION_REMEMBER_LIFETIME_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_DURATION_SECONDS)),
        )
}

fn with_key_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HASH_KEY)
                .long(ARG_HASH_KEY)
                .help("Base64 HMAC key authenticating the session cookie (>= 32 bytes)")
                .env("SENTINEL_SESSION_HASH_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_BLOCK_KEY)
                .long(ARG_BLOCK_KEY)
                .help("Base64 AES-256 key encrypting the session cookie (32 bytes)")
                .env("SENTINEL_SESSION_BLOCK_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_EPHEMERAL_KEYS)
                .long(ARG_EPHEMERAL_KEYS)
                .help("Generate random session keys when none are configured (development only)")
                .env("SENTINEL_INSECURE_EPHEMERAL_KEYS")
                .action(ArgAction::SetTrue),
        )
}
