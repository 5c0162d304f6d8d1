//! Shared fixtures for router-level tests.

use crate::{
    api::{handlers::auth::{AuthConfig, AuthState}, middleware::CsrfConfig},
    authenticator::{AuthError, AuthFailureReason, Authenticator, AuthenticatorError, Identity},
    session::{SessionConfig, SessionKeys, SessionStore},
};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    http::{HeaderMap, HeaderName, header::COOKIE, request::Builder},
    response::Response,
};
use cookie::Cookie;
use std::{collections::BTreeMap, sync::Arc};

pub(crate) const SESSION_COOKIE: &str = "sentinel_session";
pub(crate) const CSRF_COOKIE: &str = "sentinel_csrf";
pub(crate) const CSRF_HEADER: &str = "x-csrf-token";
pub(crate) const AUTH_COOKIE: &str = "Authorization";

/// In-memory identity provider keyed by credential.
///
/// - `valid-token`: `u-1`, `ops@example.com`, role `admin`
/// - `provider-token`: `u-2` with no email, re-issued as `issued-by-provider`
///   (also accepted) plus a refresh token
/// - `expired-token`: rejected with `token_expired`
/// - `invalid-token`: rejected with `token_invalid`
/// - anything else: rejected without a reason
pub(crate) struct FakeAuthenticator;

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(
        &self,
        _headers: &HeaderMap,
        credential: &str,
    ) -> Result<Identity, AuthenticatorError> {
        match credential {
            "valid-token" => Ok(Identity {
                uid: "u-1".to_string(),
                email: "ops@example.com".to_string(),
                roles: vec!["admin".to_string()],
                ..Identity::default()
            }),
            "provider-token" | "issued-by-provider" => Ok(Identity {
                uid: "u-2".to_string(),
                token: "issued-by-provider".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                feature_flags: BTreeMap::from([("beta".to_string(), true)]),
                ..Identity::default()
            }),
            "expired-token" => Err(AuthError::new(AuthFailureReason::TokenExpired).into()),
            "invalid-token" => Err(AuthError::new(AuthFailureReason::TokenInvalid).into()),
            _ => Err(AuthenticatorError::Unauthorized),
        }
    }
}

pub(crate) fn state(base: &str) -> Result<Arc<AuthState>> {
    let config = AuthConfig::new(base);
    let sessions = SessionStore::new(
        SessionConfig::new(SESSION_COOKIE).with_path(config.base_path()),
        SessionKeys::new(vec![7u8; 32], vec![9u8; 32])?,
    );
    let csrf = CsrfConfig::new(CSRF_COOKIE, HeaderName::from_static(CSRF_HEADER))
        .with_path(config.base_path());

    Ok(Arc::new(AuthState::new(
        config,
        sessions,
        csrf,
        Arc::new(FakeAuthenticator),
    )))
}

/// Parsed `Set-Cookie` headers of a response.
pub(crate) fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .collect()
}

pub(crate) fn set_cookie(response: &Response, name: &str) -> Option<Cookie<'static>> {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.name() == name)
}

pub(crate) fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Browser-like cookie jar for multi-request scenarios.
#[derive(Debug, Default)]
pub(crate) struct Jar(BTreeMap<String, String>);

impl Jar {
    /// Apply a response's `Set-Cookie` headers; expired cookies are removed.
    pub(crate) fn store(&mut self, response: &Response) {
        for raw in response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
        {
            let Some((name, value)) = raw.split(';').next().and_then(|pair| pair.split_once('='))
            else {
                continue;
            };
            let removed = Cookie::parse(raw.to_string())
                .ok()
                .and_then(|cookie| cookie.max_age())
                .is_some_and(|max_age| max_age <= time::Duration::ZERO);

            if removed {
                self.0.remove(name.trim());
            } else {
                self.0.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub(crate) fn set(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    /// Attach the jar's cookies to a request builder.
    pub(crate) fn apply(&self, builder: Builder) -> Builder {
        if self.0.is_empty() {
            return builder;
        }
        let value = self
            .0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder.header(COOKIE, value)
    }
}
