//! Auth state and configuration shared by the middleware chain and the
//! login/logout handlers.

use crate::{
    api::middleware::csrf::CsrfConfig, authenticator::Authenticator, session::SessionStore,
};
use std::{fmt, sync::Arc, time::Duration};

const DEFAULT_AUTH_COOKIE_NAME: &str = "Authorization";
const DEFAULT_AUTHENTICATOR_TIMEOUT_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_path: String,
    login_path: String,
    auth_cookie_name: String,
    authenticator_timeout: Duration,
}

impl AuthConfig {
    /// Console mounted at `base_path`, login page at `<base>/login`.
    #[must_use]
    pub fn new(base_path: &str) -> Self {
        let base_path = normalize_base_path(base_path);
        let login_path = join_path(&base_path, "login");
        Self {
            base_path,
            login_path,
            auth_cookie_name: DEFAULT_AUTH_COOKIE_NAME.to_string(),
            authenticator_timeout: Duration::from_secs(DEFAULT_AUTHENTICATOR_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: &str) -> Self {
        self.login_path = normalize_base_path(login_path);
        self
    }

    #[must_use]
    pub fn with_auth_cookie_name(mut self, name: String) -> Self {
        self.auth_cookie_name = name;
        self
    }

    #[must_use]
    pub const fn with_authenticator_timeout(mut self, timeout: Duration) -> Self {
        self.authenticator_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn auth_cookie_name(&self) -> &str {
        &self.auth_cookie_name
    }

    #[must_use]
    pub const fn authenticator_timeout(&self) -> Duration {
        self.authenticator_timeout
    }

    /// Absolute path of `suffix` under the console base path.
    #[must_use]
    pub fn route(&self, suffix: &str) -> String {
        join_path(&self.base_path, suffix)
    }

    /// Whether the login page lives below the console base path. The base path
    /// itself is the console root and cannot double as the login page.
    #[must_use]
    pub fn login_within_base(&self) -> bool {
        if self.login_path == self.base_path {
            return false;
        }
        self.base_path == "/" || self.login_path.starts_with(&format!("{}/", self.base_path))
    }
}

/// Leading slash, no trailing slash (except for the root).
pub(crate) fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn join_path(base: &str, suffix: &str) -> String {
    let suffix = suffix.trim_start_matches('/');
    if base == "/" {
        format!("/{suffix}")
    } else if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{suffix}")
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionStore,
    csrf: CsrfConfig,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        sessions: SessionStore,
        csrf: CsrfConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config,
            sessions,
            csrf,
            authenticator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn csrf(&self) -> &CsrfConfig {
        &self.csrf
    }

    #[must_use]
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("csrf", &self.csrf)
            .finish_non_exhaustive()
    }
}
