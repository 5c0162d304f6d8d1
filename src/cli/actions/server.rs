use crate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState},
        middleware::CsrfConfig,
    },
    authenticator::{Authenticator, RemoteAuthenticator},
    cli::commands::{authenticator, console, csrf, session},
    session::{CookieSecurity, SessionConfig, SessionStore},
};
use anyhow::{Context, Result, bail};
use cookie::SameSite;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub console: console::Options,
    pub session: session::Options,
    pub csrf: csrf::Options,
    pub authenticator: authenticator::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let state = build_state(&args)?;

    info!(
        base_path = state.config().base_path(),
        login_path = state.config().login_path(),
        "console configured"
    );

    api::new(args.port, state).await
}

/// Assemble the shared auth state from parsed options.
///
/// # Errors
/// Returns an error on missing or malformed keys, an unusable login path or an
/// invalid authenticator URL.
pub fn build_state(args: &Args) -> Result<Arc<AuthState>> {
    let config = auth_config(args)?;
    let sessions = session_store(args, config.base_path())?;

    let csrf = CsrfConfig::new(args.csrf.cookie_name.clone(), args.csrf.header_name.clone())
        .with_path(config.base_path())
        .with_domain(args.session.cookie_domain.clone())
        .with_security(args.session.cookie_secure);

    let authenticator: Arc<dyn Authenticator> = Arc::new(
        RemoteAuthenticator::new(&args.authenticator.url, args.authenticator.timeout)
            .context("invalid --authenticator-url")?,
    );

    debug!("Session config: {:?}", sessions.config());

    Ok(Arc::new(AuthState::new(config, sessions, csrf, authenticator)))
}

fn auth_config(args: &Args) -> Result<AuthConfig> {
    let mut config = AuthConfig::new(&args.console.base_path)
        .with_auth_cookie_name(args.console.auth_cookie_name.clone())
        .with_authenticator_timeout(args.authenticator.timeout);
    if let Some(login_path) = &args.console.login_path {
        config = config.with_login_path(login_path);
    }

    if !config.login_within_base() {
        bail!(
            "login path {} must live under the base path {}",
            config.login_path(),
            config.base_path()
        );
    }

    let reserved = [
        config.route("logout"),
        config.route("fragments/session"),
        "/health".to_string(),
    ];
    if reserved.iter().any(|path| path == config.login_path()) {
        bail!("login path {} collides with a console route", config.login_path());
    }

    Ok(config)
}

fn session_store(args: &Args, path: &str) -> Result<SessionStore> {
    let options = &args.session;

    if options.same_site == SameSite::None && options.cookie_secure != CookieSecurity::Always {
        warn!("SameSite=None cookies are ignored by browsers unless Secure; consider --cookie-secure always");
    }

    let config = SessionConfig::new(options.cookie_name.clone())
        .with_path(path)
        .with_domain(options.cookie_domain.clone())
        .with_security(options.cookie_secure)
        .with_same_site(options.same_site)
        .with_idle_timeout(seconds(options.idle_timeout_seconds)?)
        .with_lifetime(seconds(options.lifetime_seconds)?)
        .with_remember_lifetime(seconds(options.remember_lifetime_seconds)?);

    Ok(SessionStore::new(config, options.keys()?))
}

fn seconds(value: u64) -> Result<time::Duration> {
    let value = i64::try_from(value).context("duration out of range")?;
    Ok(time::Duration::seconds(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{actions::Action, commands, dispatch};

    fn args(extra: &[&str]) -> Result<Args> {
        temp_env::with_vars(
            [
                ("SENTINEL_BASE_PATH", None::<&str>),
                ("SENTINEL_LOGIN_PATH", None::<&str>),
                ("SENTINEL_AUTHENTICATOR_URL", None::<&str>),
                ("SENTINEL_SESSION_HASH_KEY", None::<&str>),
                ("SENTINEL_SESSION_BLOCK_KEY", None::<&str>),
            ],
            || {
                let mut argv = vec![
                    "sentinel",
                    "--authenticator-url",
                    "http://127.0.0.1:9999/api",
                    "--insecure-ephemeral-keys",
                ];
                argv.extend_from_slice(extra);
                let matches = commands::new().try_get_matches_from(argv)?;
                let Action::Server(args) = dispatch::handler(&matches)?;
                Ok(args)
            },
        )
    }

    #[test]
    fn builds_state() -> Result<()> {
        let state = build_state(&args(&["--base-path", "/admin", "--cookie-domain", "ops.example.com"])?)?;
        assert_eq!(state.config().base_path(), "/admin");
        assert_eq!(state.config().login_path(), "/admin/login");
        assert_eq!(state.sessions().config().path(), "/admin");
        assert_eq!(state.sessions().config().domain(), Some("ops.example.com"));
        assert_eq!(state.sessions().config().idle_timeout(), time::Duration::minutes(30));
        assert_eq!(state.csrf().cookie_name(), "sentinel_csrf");
        Ok(())
    }

    #[test]
    fn login_outside_base_is_rejected() -> Result<()> {
        let parsed = args(&["--base-path", "/admin", "--login-path", "/login"])?;
        assert!(build_state(&parsed).is_err());
        Ok(())
    }

    #[test]
    fn login_on_console_route_is_rejected() -> Result<()> {
        let parsed = args(&["--base-path", "/admin", "--login-path", "/admin/logout"])?;
        assert!(build_state(&parsed).is_err());
        let parsed = args(&["--base-path", "/admin", "--login-path", "/admin"])?;
        assert!(build_state(&parsed).is_err());
        Ok(())
    }

    #[test]
    fn invalid_authenticator_url_is_rejected() -> Result<()> {
        let mut parsed = args(&[])?;
        parsed.authenticator.url = "ftp://idp.example.com".to_string();
        assert!(build_state(&parsed).is_err());
        Ok(())
    }
}
