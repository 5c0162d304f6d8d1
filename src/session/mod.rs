//! Stateless browser session.
//!
//! The whole [`Session`] lives inside a signed and encrypted cookie; there is no
//! server-side table. A session without a user is a valid anonymous session.

pub mod codec;
pub mod middleware;
pub mod store;

pub use self::codec::{SessionCodec, SessionError, SessionKeys};
pub use self::middleware::{SessionHandle, load_session};
pub use self::store::{CookieSecurity, SessionConfig, SessionStore};

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use time::OffsetDateTime;

/// Identity of an authenticated console user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub token: String,
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUser")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<SessionUser>,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    issued_at: i64,
    last_seen_at: i64,
    expires_at: i64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("feature_flags", &self.feature_flags)
            .field("remember_me", &self.remember_me)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("issued_at", &self.issued_at)
            .field("last_seen_at", &self.last_seen_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    /// Fresh anonymous session issued at `now`.
    #[must_use]
    pub fn anonymous(now: OffsetDateTime) -> Self {
        let now = now.unix_timestamp();
        Self {
            user: None,
            feature_flags: BTreeMap::new(),
            remember_me: false,
            refresh_token: None,
            issued_at: now,
            last_seen_at: now,
            expires_at: now,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Attach an authenticated identity, restarting the absolute lifetime.
    ///
    /// Restarting the clock on privilege elevation keeps a pre-login cookie from
    /// carrying its age into the authenticated session. The refresh token always
    /// follows the new sign-in, `None` included.
    pub fn sign_in(
        &mut self,
        user: SessionUser,
        remember_me: bool,
        refresh_token: Option<String>,
        now: OffsetDateTime,
    ) {
        self.user = Some(user);
        self.remember_me = remember_me;
        self.refresh_token = refresh_token;
        self.issued_at = now.unix_timestamp();
        self.last_seen_at = self.issued_at;
    }

    /// Drop the identity but keep anonymous state such as feature flags.
    pub fn clear_user(&mut self) {
        self.user = None;
        self.refresh_token = None;
    }

    #[must_use]
    pub fn issued_at(&self) -> OffsetDateTime {
        from_unix(self.issued_at)
    }

    #[must_use]
    pub fn last_seen_at(&self) -> OffsetDateTime {
        from_unix(self.last_seen_at)
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        from_unix(self.expires_at)
    }

    pub(crate) fn touch(&mut self, now: OffsetDateTime) {
        self.last_seen_at = now.unix_timestamp();
    }

    pub(crate) fn set_expires_at(&mut self, at: OffsetDateTime) {
        self.expires_at = at.unix_timestamp();
    }
}

fn from_unix(ts: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
