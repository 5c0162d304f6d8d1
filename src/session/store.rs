use super::{Session, SessionCodec, SessionError, SessionKeys};
use crate::cookies;
use axum::http::HeaderMap;
use cookie::{Cookie, SameSite};
use std::{str::FromStr, sync::Arc};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

/// When to set the `Secure` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieSecurity {
    /// Secure only when the request arrived over TLS.
    #[default]
    Auto,
    Always,
    Never,
}

impl CookieSecurity {
    #[must_use]
    pub const fn secure_for(self, tls: bool) -> bool {
        match self {
            Self::Auto => tls,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl FromStr for CookieSecurity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" | "true" => Ok(Self::Always),
            "never" | "false" => Ok(Self::Never),
            other => Err(format!("invalid cookie security mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    cookie_name: String,
    path: String,
    domain: Option<String>,
    security: CookieSecurity,
    same_site: SameSite,
    idle_timeout: Duration,
    lifetime: Duration,
    remember_lifetime: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            path: "/".to_string(),
            domain: None,
            security: CookieSecurity::Auto,
            same_site: SameSite::Lax,
            idle_timeout: Duration::minutes(30),
            lifetime: Duration::hours(12),
            remember_lifetime: Duration::days(30),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|value| !value.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_security(mut self, security: CookieSecurity) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub const fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub const fn with_remember_lifetime(mut self, remember_lifetime: Duration) -> Self {
        self.remember_lifetime = remember_lifetime;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub const fn security(&self) -> CookieSecurity {
        self.security
    }

    #[must_use]
    pub const fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    #[must_use]
    pub const fn remember_lifetime(&self) -> Duration {
        self.remember_lifetime
    }
}

/// Loads and persists [`Session`]s through the session cookie.
///
/// Keys are immutable after construction and shared by every clone.
#[derive(Debug, Clone)]
pub struct SessionStore {
    config: Arc<SessionConfig>,
    codec: SessionCodec,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: SessionConfig, keys: SessionKeys) -> Self {
        let codec = SessionCodec::new(config.cookie_name(), keys);
        Self {
            config: Arc::new(config),
            codec,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::anonymous(OffsetDateTime::now_utc())
    }

    /// Session carried by the request, or a fresh anonymous one.
    ///
    /// Missing, expired, idle and undecodable cookies all produce the same
    /// result; only tampering is logged.
    #[must_use]
    pub fn load(&self, headers: &HeaderMap) -> Session {
        self.load_at(headers, OffsetDateTime::now_utc())
    }

    pub(crate) fn load_at(&self, headers: &HeaderMap, now: OffsetDateTime) -> Session {
        let Some(value) = cookies::read(headers, self.config.cookie_name()) else {
            return Session::anonymous(now);
        };

        match self.codec.decode(&value) {
            Ok(session) if self.is_expired(&session, now) => {
                debug!("session cookie expired, starting a new session");
                Session::anonymous(now)
            }
            Ok(session) => session,
            Err(err) => {
                warn!("discarding invalid session cookie: {err}");
                Session::anonymous(now)
            }
        }
    }

    /// Lifetime class that applies to the session.
    #[must_use]
    pub fn lifetime_for(&self, session: &Session) -> Duration {
        if session.remember_me {
            self.config.remember_lifetime
        } else {
            self.config.lifetime
        }
    }

    /// Recompute `expires_at` and encode the session into a cookie.
    ///
    /// # Errors
    /// Returns an error if the session cannot be encoded.
    pub fn save(&self, session: &mut Session, secure: bool) -> Result<Cookie<'static>, SessionError> {
        self.save_at(session, secure, OffsetDateTime::now_utc())
    }

    pub(crate) fn save_at(
        &self,
        session: &mut Session,
        secure: bool,
        now: OffsetDateTime,
    ) -> Result<Cookie<'static>, SessionError> {
        session.touch(now);
        let Some(expires_at) = session.issued_at().checked_add(self.lifetime_for(session)) else {
            warn!("session lifetime overflows the calendar, dropping the session cookie");
            return Ok(self.destroy_cookie(secure));
        };
        session.set_expires_at(expires_at);

        let remaining = Duration::seconds(expires_at.unix_timestamp() - now.unix_timestamp());
        if remaining <= Duration::ZERO {
            return Ok(self.destroy_cookie(secure));
        }

        let value = self.codec.encode(session)?;
        let mut builder = Cookie::build((self.config.cookie_name.clone(), value))
            .path(self.config.path.clone())
            .http_only(true)
            .secure(secure)
            .same_site(self.config.same_site)
            .max_age(remaining)
            .expires(expires_at);

        if let Some(domain) = &self.config.domain {
            builder = builder.domain(domain.clone());
        }

        Ok(builder.build())
    }

    /// Cookie that removes the session from the browser.
    #[must_use]
    pub fn destroy_cookie(&self, secure: bool) -> Cookie<'static> {
        cookies::expired(
            self.config.cookie_name(),
            self.config.path(),
            self.config.domain(),
            secure,
        )
    }

    fn is_expired(&self, session: &Session, now: OffsetDateTime) -> bool {
        now >= session.expires_at()
            || now - session.last_seen_at() >= self.config.idle_timeout
            || now - session.issued_at() >= self.lifetime_for(session)
    }
}
